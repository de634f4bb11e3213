use std::sync::Arc;

use chrono::{Duration, Utc};
use secrecy::SecretString;

use super::error::AuthError;
use super::state::{AuthConfig, AuthState};
use super::store::{CredentialStore, MemoryCredentialStore};

fn test_state() -> (AuthState, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let config = AuthConfig::new(
        SecretString::from("access-secret"),
        SecretString::from("refresh-secret"),
    )
    // low cost keeps the hashing rounds cheap in tests
    .with_bcrypt_cost(4);
    let state = AuthState::new(config, store.clone());
    (state, store)
}

#[tokio::test]
async fn register_then_login_round_trip() {
    let (state, _store) = test_state();
    let service = state.service();

    let account = service.register("alice", "hunter22").await.unwrap();
    assert_eq!(account.username, "alice");

    let outcome = service.login("alice", "hunter22").await.unwrap();
    assert_eq!(outcome.account.id, account.id);

    let claims = state.codec().verify_access(&outcome.access_token).unwrap();
    assert_eq!(claims.sub, account.id);
    assert_eq!(claims.name, "alice");
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let (state, _store) = test_state();
    let service = state.service();

    service.register("alice", "hunter22").await.unwrap();
    let err = service.register("alice", "other-pass").await.unwrap_err();
    assert!(matches!(err, AuthError::DuplicateAccount));
}

#[tokio::test]
async fn username_and_password_bounds_are_enforced() {
    let (state, _store) = test_state();
    let service = state.service();

    assert!(matches!(
        service.register("ab", "hunter22").await.unwrap_err(),
        AuthError::Validation(_)
    ));
    assert!(matches!(
        service.register("alice", "short").await.unwrap_err(),
        AuthError::Validation(_)
    ));
    assert!(matches!(
        service
            .register("alice", &"x".repeat(51))
            .await
            .unwrap_err(),
        AuthError::Validation(_)
    ));
}

#[tokio::test]
async fn unknown_user_and_wrong_password_are_indistinguishable() {
    let (state, _store) = test_state();
    let service = state.service();

    service.register("alice", "hunter22").await.unwrap();

    let unknown = service.login("nobody", "hunter22").await.unwrap_err();
    let wrong = service.login("alice", "wrong-pass").await.unwrap_err();

    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn refresh_issues_a_new_access_token() {
    let (state, _store) = test_state();
    let service = state.service();

    service.register("alice", "hunter22").await.unwrap();
    let outcome = service.login("alice", "hunter22").await.unwrap();

    let access = service.refresh_access(&outcome.refresh_token).await.unwrap();
    let claims = state.codec().verify_access(&access).unwrap();
    assert_eq!(claims.sub, outcome.account.id);

    // refresh does not rotate: the same refresh token keeps working
    service.refresh_access(&outcome.refresh_token).await.unwrap();
}

#[tokio::test]
async fn access_token_is_not_accepted_as_refresh_token() {
    let (state, _store) = test_state();
    let service = state.service();

    service.register("alice", "hunter22").await.unwrap();
    let outcome = service.login("alice", "hunter22").await.unwrap();

    let err = service.refresh_access(&outcome.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenInvalid));
}

#[tokio::test]
async fn stored_expired_refresh_token_is_purged_on_use() {
    let (state, store) = test_state();
    let service = state.service();

    let account = service.register("alice", "hunter22").await.unwrap();
    let token = state.codec().issue_refresh(account.id, "alice").unwrap();
    store
        .create_refresh_token(&token, account.id, Utc::now() - Duration::seconds(10))
        .await
        .unwrap();

    let err = service.refresh_access(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenInvalid));

    // the dead row was deleted when it was discovered
    assert!(store.find_refresh_token(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn password_reset_revokes_every_session() {
    let (state, _store) = test_state();
    let service = state.service();

    let account = service.register("alice", "hunter22").await.unwrap();
    let laptop = service.login("alice", "hunter22").await.unwrap();
    let phone = service.login("alice", "hunter22").await.unwrap();

    service
        .reset_password(account.id, "hunter22", "new-password")
        .await
        .unwrap();

    for token in [&laptop.refresh_token, &phone.refresh_token] {
        let err = service.refresh_access(token).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenInvalid));
    }

    assert!(matches!(
        service.login("alice", "hunter22").await.unwrap_err(),
        AuthError::InvalidCredentials
    ));
    service.login("alice", "new-password").await.unwrap();
}

#[tokio::test]
async fn password_reset_rejects_wrong_old_password() {
    let (state, _store) = test_state();
    let service = state.service();

    let account = service.register("alice", "hunter22").await.unwrap();
    let err = service
        .reset_password(account.id, "not-it", "new-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOldPassword));

    // the original password still works and sessions were kept
    service.login("alice", "hunter22").await.unwrap();
}

#[tokio::test]
async fn logout_revokes_only_the_presented_session() {
    let (state, _store) = test_state();
    let service = state.service();

    service.register("alice", "hunter22").await.unwrap();
    let laptop = service.login("alice", "hunter22").await.unwrap();
    let phone = service.login("alice", "hunter22").await.unwrap();

    // back-to-back logins must not collide on the same stored token row
    assert_ne!(laptop.refresh_token, phone.refresh_token);

    service.logout(&laptop.refresh_token).await.unwrap();

    let err = service.refresh_access(&laptop.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshTokenInvalid));
    service.refresh_access(&phone.refresh_token).await.unwrap();

    // second logout of the same token is a no-op
    service.logout(&laptop.refresh_token).await.unwrap();
}
