//! In-memory authentication session backed by the `/auth/*` endpoints.
//!
//! - Login/registration against the backend
//! - Credential Store implementation used by the executor
//! - Refresh de-duplication: callers that hit 401 while a refresh is already
//!   running wait for it and reuse its outcome
//! - Best-effort logout that always clears local state

use crate::core::schema::{self, extract_error_message, validate_response};
use crate::domain::model::{
    AccessToken, Credentials, HttpResponse, LoginResponse, RefreshTokenResponse, RegisterResponse,
    RequestDescriptor, TokenSet, UserProfile,
};
use crate::domain::ports::{CredentialStore, HttpTransport};
use crate::utils::error::{ExtractError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct SessionState {
    tokens: Option<TokenSet>,
    user: Option<UserProfile>,
}

pub struct AuthSession {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    state: RwLock<SessionState>,
    /// 上一次 refresh 的結果，同時作為 refresh 的互斥鎖
    refresh_gate: Mutex<bool>,
    refresh_epoch: AtomicU64,
}

impl AuthSession {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: RwLock::new(SessionState::default()),
            refresh_gate: Mutex::new(false),
            refresh_epoch: AtomicU64::new(0),
        }
    }

    /// Installs tokens obtained elsewhere, e.g. from a previous run.
    pub fn restore(&self, tokens: TokenSet) {
        self.write_state().tokens = Some(tokens);
    }

    pub fn credentials(&self) -> Credentials {
        self.read_state()
            .tokens
            .as_ref()
            .map(Credentials::from_token_set)
            .unwrap_or_default()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read_state().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().tokens.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_refresh_token(&self) -> Option<String> {
        self.read_state()
            .tokens
            .as_ref()
            .map(|tokens| tokens.refresh_token.clone())
    }

    async fn post_json(&self, path: &str, body: serde_json::Value, access: Option<&AccessToken>) -> Result<HttpResponse> {
        let request = RequestDescriptor::post(self.endpoint(path))
            .header("Content-Type", "application/json")
            .json(body);
        self.transport.send(&request.prepare(access)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        tracing::debug!("Logging in as {}", email);
        let response = self
            .post_json("/auth/login", json!({ "email": email, "password": password }), None)
            .await?;

        if !response.is_success() {
            let payload = response.json_or(json!({ "message": "Login failed" }));
            return Err(ExtractError::api(response.status, extract_error_message(&payload)));
        }

        let data: LoginResponse = validate_response(&schema::login_response(), response.json()?, "login")?;
        let user = UserProfile {
            id: data.user_id,
            name: data.name,
            email: email.to_string(),
        };
        let tokens = TokenSet::new(AccessToken::new(data.token_type, data.access_token), data.refresh_token);

        {
            let mut state = self.write_state();
            state.tokens = Some(tokens);
            state.user = Some(user.clone());
        }

        tracing::info!("✅ Logged in as {} ({})", user.name, user.id);
        Ok(user)
    }

    /// Returns the server's confirmation message; does not log in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<String> {
        let response = self
            .post_json(
                "/auth/register",
                json!({ "name": name, "email": email, "password": password }),
                None,
            )
            .await?;

        if !response.is_success() {
            let payload = response.json_or(json!({ "message": "Registration failed" }));
            return Err(ExtractError::api(response.status, extract_error_message(&payload)));
        }

        let data: RegisterResponse =
            validate_response(&schema::register_response(), response.json()?, "registration")?;
        Ok(data.message)
    }

    pub async fn logout(&self) {
        let (refresh_token, access) = {
            let state = self.read_state();
            match state.tokens.as_ref() {
                Some(tokens) => (Some(tokens.refresh_token.clone()), Some(tokens.access.clone())),
                None => (None, None),
            }
        };

        if let Some(refresh_token) = refresh_token {
            // 伺服器端失敗只記錄，不阻擋本地登出
            match self
                .post_json("/auth/logout", json!({ "refresh_token": refresh_token }), access.as_ref())
                .await
            {
                Ok(response) if !response.is_success() => {
                    tracing::warn!("Logout API call failed with status {}", response.status)
                }
                Err(e) => tracing::warn!("Logout API error: {}", e),
                Ok(_) => {}
            }
        }

        self.clear();
        tracing::info!("Session cleared (logged out)");
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let response = self
            .post_json("/auth/refresh", json!({ "refresh_token": refresh_token }), None)
            .await?;

        if !response.is_success() {
            return Err(ExtractError::api(response.status, "Token refresh failed"));
        }

        let data: RefreshTokenResponse =
            validate_response(&schema::refresh_token_response(), response.json()?, "token refresh")?;
        Ok(TokenSet::new(
            AccessToken::new(data.token_type, data.access_token),
            data.refresh_token,
        ))
    }

    async fn perform_refresh(&self) -> bool {
        let Some(refresh_token) = self.current_refresh_token() else {
            tracing::warn!("No refresh token available");
            self.clear();
            return false;
        };

        match self.request_refresh(&refresh_token).await {
            Ok(tokens) => {
                let previous_age = self
                    .read_state()
                    .tokens
                    .as_ref()
                    .map(|old| chrono::Utc::now() - old.issued_at);
                self.write_state().tokens = Some(tokens);
                tracing::info!(
                    "🔑 Access token refreshed (previous token age: {:?})",
                    previous_age.map(|age| age.num_seconds())
                );
                true
            }
            Err(e) => {
                tracing::error!("Token refresh failed: {}", e);
                self.clear();
                false
            }
        }
    }
}

#[async_trait]
impl CredentialStore for AuthSession {
    fn read(&self) -> Option<AccessToken> {
        self.read_state().tokens.as_ref().map(|tokens| tokens.access.clone())
    }

    async fn refresh(&self) -> bool {
        let ticket = self.refresh_epoch.load(Ordering::Acquire);
        let mut last_outcome = self.refresh_gate.lock().await;

        // 等待期間已有其他呼叫完成 refresh，直接沿用其結果
        if self.refresh_epoch.load(Ordering::Acquire) != ticket {
            tracing::debug!("Joined a refresh completed by a concurrent request");
            return *last_outcome;
        }

        let outcome = self.perform_refresh().await;
        *last_outcome = outcome;
        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    fn clear(&self) {
        let mut state = self.write_state();
        state.tokens = None;
        state.user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::ScriptedTransport;
    use crate::domain::model::{HttpResponse, RequestBody};

    const BASE_URL: &str = "https://api.example.com";

    fn session(transport: &Arc<ScriptedTransport>) -> AuthSession {
        AuthSession::new(transport.clone(), BASE_URL)
    }

    fn signed_in(transport: &Arc<ScriptedTransport>) -> AuthSession {
        let session = session(transport);
        session.restore(TokenSet::new(AccessToken::new("Bearer", "old-access"), "old-refresh"));
        session
    }

    fn refreshed_tokens() -> serde_json::Value {
        json!({"access_token": "new-access", "refresh_token": "new-refresh", "token_type": "Bearer"})
    }

    #[tokio::test]
    async fn test_login_stores_tokens_and_user() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(
            200,
            json!({
                "access_token": "a-1",
                "refresh_token": "r-1",
                "token_type": "Bearer",
                "name": "Ada",
                "user_id": "u-42"
            }),
        ));
        let session = session(&transport);

        let user = session.login("ada@example.com", "hunter2").await.unwrap();

        assert_eq!(user.id, "u-42");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(session.read().unwrap().authorization_value(), "Bearer a-1");
        assert_eq!(session.credentials().refresh_token.as_deref(), Some("r-1"));

        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://api.example.com/auth/login");
        assert_eq!(request.authorization(), None);
        assert_eq!(
            request.body,
            RequestBody::Json(json!({"email": "ada@example.com", "password": "hunter2"}))
        );
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_detail() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(401, json!({"detail": "Invalid credentials"})));
        let session = session(&transport);

        let err = session.login("ada@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_rejects_malformed_body() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(
            200,
            json!({"access_token": "a", "refresh_token": "r", "token_type": "Bearer", "name": "Ada"}),
        ));
        let session = session(&transport);

        let err = session.login("ada@example.com", "pw").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid login response: user_id: Required");
        assert!(session.read().is_none());
    }

    #[tokio::test]
    async fn test_register_returns_message_and_falls_back() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_json(201, json!({"message": "User created"}))
                .respond(HttpResponse::new(500, b"internal".to_vec())),
        );
        let session = session(&transport);

        assert_eq!(session.register("Ada", "ada@example.com", "pw").await.unwrap(), "User created");
        let err = session.register("Ada", "ada@example.com", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), "Registration failed");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_makes_no_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = session(&transport);

        assert!(!session.refresh().await);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_all_fields() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(200, refreshed_tokens()));
        let session = signed_in(&transport);

        assert!(session.refresh().await);

        let credentials = session.credentials();
        assert_eq!(credentials.access, Some(AccessToken::new("Bearer", "new-access")));
        assert_eq!(credentials.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(
            transport.requests()[0].body,
            RequestBody::Json(json!({"refresh_token": "old-refresh"}))
        );
    }

    #[tokio::test]
    async fn test_refresh_rejected_clears_session() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(401, json!({"detail": "revoked"})));
        let session = signed_in(&transport);

        assert!(!session.refresh().await);
        assert_eq!(session.credentials(), Credentials::default());
    }

    #[tokio::test]
    async fn test_refresh_with_malformed_body_clears_session() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(200, json!({"access_token": "only"})));
        let session = signed_in(&transport);

        assert!(!session.refresh().await);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_request() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(200, refreshed_tokens()));
        let session = signed_in(&transport);

        let (first, second) = tokio::join!(session.refresh(), session.refresh());

        assert!(first);
        assert!(second);
        assert_eq!(transport.calls(), 1);
        assert_eq!(session.read().unwrap().access_token, "new-access");
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_failure() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(400, json!({})));
        let session = signed_in(&transport);

        let (first, second) = tokio::join!(session.refresh(), session.refresh());

        assert!(!first);
        assert!(!second);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_hit_the_server() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_json(200, refreshed_tokens())
                .respond_json(
                    200,
                    json!({"access_token": "newer-access", "refresh_token": "newer-refresh", "token_type": "Bearer"}),
                ),
        );
        let session = signed_in(&transport);

        assert!(session.refresh().await);
        assert!(session.refresh().await);

        assert_eq!(transport.calls(), 2);
        assert_eq!(
            transport.requests()[1].body,
            RequestBody::Json(json!({"refresh_token": "new-refresh"}))
        );
    }

    #[tokio::test]
    async fn test_logout_posts_refresh_token_and_clears() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(200, json!({"message": "bye"})));
        let session = signed_in(&transport);

        session.logout().await;

        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://api.example.com/auth/logout");
        assert_eq!(request.authorization(), Some("Bearer old-access"));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let transport = Arc::new(ScriptedTransport::new().fail(ExtractError::IoError(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ))));
        let session = signed_in(&transport);

        session.logout().await;

        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn test_logout_without_session_skips_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = session(&transport);

        session.logout().await;

        assert_eq!(transport.calls(), 0);
    }
}
