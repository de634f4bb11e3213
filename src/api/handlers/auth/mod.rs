//! Account and session management.
//!
//! Sessions are a pair of HMAC-signed tokens: a short-lived access token
//! checked statelessly on every request, and a long-lived refresh token
//! persisted server side so it can be revoked.

pub mod error;
pub mod gate;
pub mod handlers;
pub mod service;
pub mod state;
pub mod store;
pub mod token;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::AuthError;
pub use gate::{require_auth, Principal};
pub use handlers::{login, logout, refresh_token, register, reset_password};
pub use state::{AuthConfig, AuthState};
pub use store::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
