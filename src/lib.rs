//! # Taskden
//!
//! `taskden` is a multi-user task list service: accounts own tasks, tasks can
//! be organized into groups, and everything is scoped to its owner.
//!
//! ## Sessions
//!
//! Authentication uses a two-token scheme:
//!
//! - **Access tokens** are short-lived (15 minutes by default), signed,
//!   self-describing, and verified statelessly on every request.
//! - **Refresh tokens** are long-lived (7 days), signed with an independent
//!   secret, and persisted server-side so they can be revoked. A refresh
//!   exchange issues a new access token only; the refresh token itself is
//!   never rotated and stays valid until expiry, logout, or password reset.
//!
//! Password reset is the only operation that revokes sessions: it deletes
//! every outstanding refresh token for the account, forcing re-login on all
//! devices.
//!
//! ## Client
//!
//! The [`client`] module is the service's own API client. It holds the token
//! pair, attaches the access token to outgoing calls, and on a 401 performs
//! exactly one silent refresh-and-retry before clearing the session and
//! surfacing the failure.

pub mod api;
pub mod cli;
pub mod client;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
