use crate::domain::model::{HttpResponse, RequestDescriptor};
use crate::domain::ports::{CredentialStore, HttpTransport};
use crate::utils::error::{ExtractError, Result};
use std::sync::Arc;

/// Sends a request with the current credentials and, on 401, refreshes them
/// once and retries once.
///
/// A refresh failure clears the credential store and surfaces
/// [`ExtractError::SessionExpired`]; the 401 response itself is never handed
/// back to the caller. Any other status, including errors, is returned as-is.
pub struct AuthenticatedExecutor {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialStore>,
}

impl AuthenticatedExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub async fn execute(&self, request: &RequestDescriptor) -> Result<HttpResponse> {
        let first_attempt = request.prepare(self.credentials.read().as_ref());
        tracing::debug!(
            "📡 {} {} (authenticated: {})",
            request.method.as_str(),
            request.url,
            first_attempt.authorization().is_some()
        );

        let response = self.transport.send(&first_attempt).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        tracing::info!("🔑 {} returned 401, refreshing credentials", request.url);
        if !self.credentials.refresh().await {
            tracing::warn!("Credential refresh failed, clearing session");
            self.credentials.clear();
            return Err(ExtractError::SessionExpired);
        }

        // 使用 refresh 後的新 token 重送一次，不論結果都直接回傳
        let second_attempt = request.prepare(self.credentials.read().as_ref());
        let response = self.transport.send(&second_attempt).await?;
        tracing::debug!(
            "📡 retry {} {} -> {}",
            request.method.as_str(),
            request.url,
            response.status
        );
        Ok(response)
    }
}
