//! Stored login sessions.
//!
//! The token pair lives in a JSON file so consecutive commands share one
//! session. Cookies are mirrored in memory only; `login` prints the
//! `Set-Cookie` values a browser would receive.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use barker_storefront::api::{ApiError, BackendClient};
use barker_storefront::session::{
    AuthError, AuthStore, CookieJarMirror, FileStorage, SessionState, TokenManager,
};
use secrecy::SecretString;
use thiserror::Error;

/// How often `watch` checks that the session is still alive.
const WATCH_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Backend error: {0}")]
    Backend(#[from] ApiError),

    #[error("Login failed: {0}")]
    Auth(#[from] AuthError),

    #[error("No password given; pass --password or set BARKER_PASSWORD")]
    MissingPassword,

    #[error("Refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Session ended: {0}")]
    Ended(String),

    #[error("Failed to print session: {0}")]
    Json(#[from] serde_json::Error),
}

/// A session restored from its file.
pub struct Session {
    store: AuthStore,
    cookies: Arc<CookieJarMirror>,
}

/// Open the session stored at `path`, re-arming its refresh timer.
pub fn open(api: &str, path: &Path) -> Result<Session, SessionError> {
    let cookies = Arc::new(CookieJarMirror::new());
    let manager = TokenManager::new(
        BackendClient::new(api)?,
        Arc::new(FileStorage::new(path)),
        cookies.clone(),
    );

    let store = AuthStore::new(manager);
    store.restore();
    tracing::debug!(path = %path.display(), "Session opened");

    Ok(Session { store, cookies })
}

pub async fn login(
    session: &Session,
    email: &str,
    password: Option<String>,
) -> Result<(), SessionError> {
    let password = password
        .or_else(|| std::env::var("BARKER_PASSWORD").ok())
        .filter(|p| !p.is_empty())
        .ok_or(SessionError::MissingPassword)?;

    let role = session
        .store
        .login(email, &SecretString::from(password))
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Logged in as {role}");
        for header in session.cookies.set_cookie_headers() {
            println!("Set-Cookie: {header}");
        }
    }

    Ok(())
}

pub async fn refresh(session: &Session) -> Result<(), SessionError> {
    if session.store.manager().refresh_access().await {
        tracing::info!("Access token refreshed");
        return Ok(());
    }

    let reason = session
        .store
        .manager()
        .last_refresh_failure()
        .unwrap_or_else(|| "no refresh token stored".to_string());
    Err(SessionError::RefreshFailed(reason))
}

pub fn status(session: &Session) -> Result<(), SessionError> {
    let state = session.store.state();
    let manager = session.store.manager();

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&state)?);
        if let Some(role) = manager.current_role() {
            println!("Role: {role}");
        }
        if let Some(at_ms) = manager.armed_refresh_at() {
            let in_secs = (at_ms - manager.clock().now_ms()) / 1000;
            println!("Next refresh in {in_secs}s");
        }
    }

    Ok(())
}

/// Keep the process alive so the refresh timer can fire.
///
/// Returns when interrupted, or with an error once a refresh is rejected.
pub async fn watch(session: &Session) -> Result<(), SessionError> {
    if !session.store.state().is_authenticated() {
        return Err(SessionError::Ended("not logged in".to_string()));
    }
    tracing::info!("Watching session; press Ctrl+C to stop");

    let mut interval = tokio::time::interval(WATCH_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopped watching");
                return Ok(());
            }
            _ = interval.tick() => {
                match session.store.state() {
                    SessionState::Authenticated(_) => {}
                    SessionState::RefreshFailed(reason) => return Err(SessionError::Ended(reason)),
                    other => return Err(SessionError::Ended(format!("{other:?}"))),
                }
            }
        }
    }
}

pub fn logout(session: &Session) {
    session.store.logout();
    tracing::info!("Logged out");
}
