//! Login/logout state for one session.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use barker_core::auth::{Claims, Role, role_for_tokens};
use barker_core::{Email, EmailError, UserId};

use super::manager::{TokenManager, TokenPair};
use crate::api::{ApiError, UserProfile};

/// Errors from logging in.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Backend error: {0}")]
    Backend(#[from] ApiError),
}

impl AuthError {
    pub(crate) fn from_api(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, message } if status.is_client_error() => {
                Self::InvalidCredentials(message)
            }
            other => Self::Backend(other),
        }
    }
}

/// The logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: Option<UserId>,
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl SessionUser {
    fn from_login(profile: UserProfile, role: Role) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            name: profile.name,
            role,
        }
    }

    /// Rebuild the user from access token claims.
    #[must_use]
    pub fn from_claims(claims: &Claims, role: Role) -> Self {
        let text = |key: &str| {
            claims
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            id: claims
                .get("user_id")
                .or_else(|| claims.get("id"))
                .and_then(Value::as_i64)
                .map(UserId::new),
            username: text("username"),
            name: text("name"),
            role,
        }
    }
}

/// Where the session stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated(SessionUser),
    /// A refresh was rejected and the session was dropped.
    RefreshFailed(String),
}

impl SessionState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Login, logout and session state on top of a [`TokenManager`].
#[derive(Debug)]
pub struct AuthStore {
    manager: TokenManager,
    state: RwLock<SessionState>,
}

impl AuthStore {
    #[must_use]
    pub const fn new(manager: TokenManager) -> Self {
        Self {
            manager,
            state: RwLock::new(SessionState::Unauthenticated),
        }
    }

    #[must_use]
    pub const fn manager(&self) -> &TokenManager {
        &self.manager
    }

    /// Pick up a session left in storage and re-arm its refresh.
    pub fn restore(&self) {
        self.manager.resume();
        if self.manager.is_authenticated()
            && let Some(claims) = self.manager.access_claims()
        {
            let role = self.manager.current_role().unwrap_or(Role::Client);
            self.set_state(SessionState::Authenticated(SessionUser::from_claims(
                &claims, role,
            )));
        }
    }

    /// Log in and start a session. Returns the user's role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` before any network call when the
    /// email is malformed, `AuthError::InvalidCredentials` when the backend
    /// rejects the login, or `AuthError::Backend` for anything else. The
    /// session is cleared on failure.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Role, AuthError> {
        let email = Email::parse(email)?;
        self.set_state(SessionState::Authenticating);

        let response = match self.manager.client().login(&email, password).await {
            Ok(response) => response,
            Err(e) => {
                tracing::info!(error = %e, "Login failed");
                self.manager.clear_tokens();
                self.set_state(SessionState::Unauthenticated);
                return Err(AuthError::from_api(e));
            }
        };

        let role = role_for_tokens(Some(response.access.expose_secret()), &response.user.roles);

        self.manager.save_tokens(
            &TokenPair {
                access: Some(response.access),
                refresh: response.refresh,
            },
            &response.user.roles,
        );
        self.set_state(SessionState::Authenticated(SessionUser::from_login(
            response.user,
            role.clone(),
        )));

        tracing::info!(role = %role, "Logged in");
        Ok(role)
    }

    /// End the session.
    pub fn logout(&self) {
        self.manager.clear_tokens();
        self.set_state(SessionState::Unauthenticated);
    }

    /// Current state. An authenticated session whose refresh was rejected
    /// reports `RefreshFailed`.
    #[must_use]
    pub fn state(&self) -> SessionState {
        let current = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match (current, self.manager.last_refresh_failure()) {
            (SessionState::Authenticated(_), Some(reason)) => {
                self.set_state(SessionState::RefreshFailed(reason.clone()));
                SessionState::RefreshFailed(reason)
            }
            (state, _) => state,
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use barker_core::auth::encode_unsigned;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::BackendClient;
    use crate::session::cookies::{CookieJarMirror, ROLE_COOKIE, TOKEN_COOKIE};
    use crate::session::scheduler::{ManualClock, ManualScheduler};
    use crate::session::storage::MemoryStorage;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn store(base_url: &str) -> (AuthStore, Arc<CookieJarMirror>) {
        let cookies = Arc::new(CookieJarMirror::new());
        let manager = TokenManager::with_runtime(
            BackendClient::new(base_url).unwrap(),
            Arc::new(MemoryStorage::new()),
            cookies.clone(),
            Arc::new(ManualClock::new(NOW_MS)),
            Arc::new(ManualScheduler::new()),
        );
        (AuthStore::new(manager), cookies)
    }

    fn access() -> String {
        encode_unsigned(&json!({"exp": NOW_MS / 1000 + 3_600, "user_id": 7}))
    }

    #[tokio::test]
    async fn test_login_saves_tokens_and_returns_first_role() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access": access(),
                "refresh": "r-1",
                "id": 7,
                "username": "ana",
                "name": "Ana",
                "roles": ["ROLE_ADMIN", "ROLE_CLIENT"]
            })))
            .mount(&server)
            .await;

        let (store, cookies) = store(&server.uri());
        let role = store
            .login("ana@barker.com", &SecretString::from("secret"))
            .await
            .unwrap();

        assert_eq!(role, Role::Admin);
        assert_eq!(cookies.value(ROLE_COOKIE).as_deref(), Some("ROLE_ADMIN"));
        assert_eq!(cookies.value(TOKEN_COOKIE), Some(access()));
        match store.state() {
            SessionState::Authenticated(user) => {
                assert_eq!(user.id, Some(UserId::new(7)));
                assert_eq!(user.username, "ana");
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_email_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (store, _) = store(&server.uri());
        let err = store
            .login("not-an-email", &SecretString::from("x"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidEmail(_)));
        assert_eq!(store.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_rejected_login_returns_to_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Usuario o contraseña incorrectos"})),
            )
            .mount(&server)
            .await;

        let (store, _) = store(&server.uri());
        let err = store
            .login("ana@barker.com", &SecretString::from("wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials(ref m) if m.contains("incorrectos")));
        assert_eq!(store.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_failed_refresh_reports_refresh_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access": access(),
                "refresh": "r-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .mount(&server)
            .await;

        let (store, _) = store(&server.uri());
        store
            .login("ana@barker.com", &SecretString::from("secret"))
            .await
            .unwrap();
        assert!(store.state().is_authenticated());

        assert!(!store.manager().refresh_access().await);
        assert!(matches!(store.state(), SessionState::RefreshFailed(ref r) if r.contains("expired")));

        store.logout();
        assert_eq!(store.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_restore_rebuilds_user_from_claims() {
        let (store, _) = store("http://127.0.0.1:9");
        store
            .manager()
            .save_tokens(&TokenPair::new(access(), "r"), &[]);

        store.restore();
        match store.state() {
            SessionState::Authenticated(user) => {
                assert_eq!(user.id, Some(UserId::new(7)));
                assert_eq!(user.role, Role::Client);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }
}
