use crate::domain::model::{AccessToken, HttpResponse, PreparedRequest};
use crate::domain::ports::{CredentialStore, HttpTransport};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// 依序回傳預先排好的回應，並記錄每一個送出的請求
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<PreparedRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond_json(self, status: u16, body: serde_json::Value) -> Self {
        self.respond(HttpResponse::from_json(status, &body))
    }

    pub(crate) fn respond(self, response: HttpResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn fail(self, error: crate::utils::error::ExtractError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub(crate) fn requests(&self) -> Vec<PreparedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        // 讓出執行權，模擬真實的網路等待
        tokio::task::yield_now().await;
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| panic!("no scripted response for {}", request.url))
    }
}

pub(crate) struct FakeCredentials {
    current: Mutex<Option<AccessToken>>,
    refreshed: Option<AccessToken>,
    refresh_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl FakeCredentials {
    pub(crate) fn signed_in(token: &str) -> Self {
        Self::with_access(Some(AccessToken::new("Bearer", token)))
    }

    pub(crate) fn anonymous() -> Self {
        Self::with_access(None)
    }

    fn with_access(access: Option<AccessToken>) -> Self {
        Self {
            current: Mutex::new(access),
            refreshed: None,
            refresh_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
        }
    }

    /// Refresh succeeds and installs `token`; without this refresh fails.
    pub(crate) fn refreshes_to(mut self, token: &str) -> Self {
        self.refreshed = Some(AccessToken::new("Bearer", token));
        self
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for FakeCredentials {
    fn read(&self) -> Option<AccessToken> {
        self.current.lock().unwrap().clone()
    }

    async fn refresh(&self) -> bool {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().unwrap();
        *current = self.refreshed.clone();
        current.is_some()
    }

    fn clear(&self) {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = None;
    }
}
