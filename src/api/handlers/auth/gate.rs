//! Bearer-token request guard.
//!
//! Verification is stateless: the access token is checked against the codec
//! only, never the store. All failures collapse to the same 401 so a caller
//! cannot distinguish a missing header from an expired token.

use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::Response;
use tracing::debug;
use uuid::Uuid;

use super::state::AuthState;
use crate::api::handlers::envelope;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticated caller context attached by the gate.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: Uuid,
    pub username: String,
}

/// Resolve the bearer token into a principal, or a uniform 401 response.
///
/// # Errors
/// Returns the ready-to-send 401 response on any failure.
pub fn require_auth(headers: &HeaderMap, auth: &AuthState) -> Result<Principal, Response> {
    let Some(token) = extract_bearer_token(headers) else {
        debug!("authorization header missing or not bearer");
        return Err(unauthorized());
    };

    match auth.codec().verify_access(token) {
        Ok(claims) => Ok(Principal {
            account_id: claims.sub,
            username: claims.name,
        }),
        Err(err) => {
            debug!("access token rejected: {err}");
            Err(unauthorized())
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme must match `Bearer ` exactly; anything else rejects.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?;
    if token.is_empty() { None } else { Some(token) }
}

fn unauthorized() -> Response {
    envelope::fail(StatusCode::UNAUTHORIZED, "unauthorized")
}
