//! Login and logout.
//!
//! Login is proxied to the backend. On success the browser gets the `token`
//! and `role` cookies the route guard reads, and the tokens in the body so
//! page scripts can store them and schedule refreshes.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use barker_core::Email;
use barker_core::auth::{Role, role_for_tokens};

use crate::api::UserProfile;
use crate::error::Result;
use crate::session::{
    AuthError, ROLE_COOKIE, TOKEN_COOKIE, expired_cookie, role_cookie, token_cookie,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseBody {
    pub user: UserProfile,
    pub role: Role,
    pub access: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// `POST /auth/login`
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let email = Email::parse(&request.email).map_err(AuthError::from)?;
    let password = SecretString::from(request.password);

    let response = state
        .backend()
        .login(&email, &password)
        .await
        .map_err(AuthError::from_api)?;

    let access = response.access.expose_secret().to_string();
    let role = role_for_tokens(Some(&access), &response.user.roles);

    set_sentry_user(&response.user, &email);
    tracing::info!(role = %role, "Customer logged in");

    let cookies = AppendHeaders([
        (SET_COOKIE, token_cookie(&access).to_string()),
        (SET_COOKIE, role_cookie(&role).to_string()),
    ]);

    Ok((
        cookies,
        Json(LoginResponseBody {
            user: response.user,
            role,
            access,
            refresh: response.refresh.map(|r| r.expose_secret().to_string()),
        }),
    ))
}

/// `POST /auth/logout`
pub async fn logout() -> impl IntoResponse {
    sentry::configure_scope(|scope| scope.set_user(None));

    (
        StatusCode::NO_CONTENT,
        AppendHeaders([
            (SET_COOKIE, expired_cookie(TOKEN_COOKIE).to_string()),
            (SET_COOKIE, expired_cookie(ROLE_COOKIE).to_string()),
        ]),
    )
}

fn set_sentry_user(user: &UserProfile, email: &Email) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: user.id.map(|id| id.to_string()),
            email: Some(email.to_string()),
            username: Some(user.username.clone()).filter(|u| !u.is_empty()),
            ..Default::default()
        }));
    });
}
