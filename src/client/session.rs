//! In-memory session state for the client agent.

use std::sync::Mutex;

use crate::api::handlers::auth::types::UserSummary;

/// The token pair plus the user it belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

/// Holds at most one session. All fields move together: `install` replaces
/// the whole pair and `clear` wipes it wholesale, so the store never holds a
/// refresh token for one user and an access token for another.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<Option<Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn install(&self, session: Session) {
        *self.lock() = Some(session);
    }

    /// Overwrite only the access token, keeping the refresh token and user.
    pub fn set_access_token(&self, access_token: String) {
        if let Some(session) = self.lock().as_mut() {
            session.access_token = access_token;
        }
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.access_token.clone())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.refresh_token.clone())
    }

    #[must_use]
    pub fn user(&self) -> Option<UserSummary> {
        self.lock().as_ref().map(|s| s.user.clone())
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(access: &str) -> Session {
        Session {
            access_token: access.to_string(),
            refresh_token: "refresh".to_string(),
            user: UserSummary {
                id: "u-1".to_string(),
                username: "alice".to_string(),
            },
        }
    }

    #[test]
    fn install_then_clear() {
        let store = SessionStore::new();
        assert!(store.access_token().is_none());

        store.install(session("a1"));
        assert_eq!(store.access_token().as_deref(), Some("a1"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));

        store.clear();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn access_token_overwrite_keeps_the_rest() {
        let store = SessionStore::new();
        store.install(session("a1"));
        store.set_access_token("a2".to_string());
        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
    }

    #[test]
    fn access_token_overwrite_without_session_is_a_noop() {
        let store = SessionStore::new();
        store.set_access_token("a2".to_string());
        assert!(store.access_token().is_none());
    }
}
