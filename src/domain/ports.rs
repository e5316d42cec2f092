use crate::domain::model::{AccessToken, HttpResponse, PollingPolicy, PreparedRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Process-wide credential state, injected into the executor.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 同步讀取目前的 access token 快照
    fn read(&self) -> Option<AccessToken>;

    /// 成功時已替換全部欄位並回傳 true；失敗時已清除狀態並回傳 false
    async fn refresh(&self) -> bool;

    /// Idempotent.
    fn clear(&self);
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<HttpResponse>;
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn polling_policy(&self) -> PollingPolicy;
}
