//! Error taxonomy for the session subsystem.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::handlers::envelope;

/// Failures reported by the session service.
///
/// `RefreshTokenInvalid` deliberately collapses bad-signature, not-found, and
/// expired refresh tokens into one value so callers cannot tell which check
/// failed; the distinction lives in logs only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already taken")]
    DuplicateAccount,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("account not found")]
    AccountNotFound,
    #[error("invalid old password")]
    InvalidOldPassword,
    #[error("invalid refresh token")]
    RefreshTokenInvalid,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateAccount => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::RefreshTokenInvalid => StatusCode::UNAUTHORIZED,
            Self::AccountNotFound => StatusCode::NOT_FOUND,
            Self::InvalidOldPassword | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            tracing::error!("session service failure: {err:#}");
            // Storage details stay out of the response body.
            return envelope::fail(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
        envelope::fail(self.status(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::DuplicateAccount.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::RefreshTokenInvalid.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::AccountNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::InvalidOldPassword.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Internal(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn wrong_password_and_unknown_user_share_one_message() {
        // Non-enumeration property: a single variant serves both cases, so
        // the wire message cannot differ.
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid username or password"
        );
    }
}
