//! Auth endpoint handlers.

use crate::api::handlers::{
    auth::{
        gate,
        service::AccountSummary,
        state::AuthState,
        types::{
            AccountResponse, LoginRequest, LoginResponse, LogoutRequest, RefreshTokenRequest,
            RefreshTokenResponse, RegisterRequest, ResetPasswordRequest, UserSummary,
        },
        AuthError,
    },
    envelope,
};
use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

fn account_response(account: &AccountSummary) -> AccountResponse {
    AccountResponse {
        id: account.id.to_string(),
        username: account.username.clone(),
        created_at: account.created_at.to_rfc3339(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created"),
        (status = 400, description = "Invalid username or password"),
        (status = 409, description = "Username already taken")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(payload)) = payload else {
        return Err(AuthError::Validation("missing request body".to_string()));
    };

    let account = state
        .service()
        .register(&payload.username, &payload.password)
        .await?;

    Ok(envelope::with_message(account_response(&account), "account created").into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued"),
        (status = 401, description = "Invalid username or password")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(payload)) = payload else {
        return Err(AuthError::Validation("missing request body".to_string()));
    };

    let outcome = state
        .service()
        .login(&payload.username, &payload.password)
        .await?;

    let body = LoginResponse {
        user: UserSummary {
            id: outcome.account.id.to_string(),
            username: outcome.account.username.clone(),
        },
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
    };

    Ok(envelope::with_message(body, "login successful").into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token"),
        (status = 401, description = "Refresh token rejected")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh_token(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(payload)) = payload else {
        return Err(AuthError::RefreshTokenInvalid);
    };

    let access_token = state
        .service()
        .refresh_access(&payload.refresh_token)
        .await?;

    Ok(envelope::ok(RefreshTokenResponse { access_token }).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated, all sessions revoked"),
        (status = 400, description = "Old password incorrect or new password invalid"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn reset_password(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let Some(Json(payload)) = payload else {
        return AuthError::Validation("missing request body".to_string()).into_response();
    };

    match state
        .service()
        .reset_password(principal.account_id, &payload.old_password, &payload.new_password)
        .await
    {
        Ok(()) => envelope::ok_empty("password updated, please log in again").into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = LogoutRequest,
    responses((status = 200, description = "Refresh token discarded")),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Response, AuthError> {
    if let Some(Json(payload)) = payload {
        state.service().logout(&payload.refresh_token).await?;
    }

    Ok(envelope::ok_empty("logged out").into_response())
}
