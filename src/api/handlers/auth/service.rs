//! Session lifecycle: registration, login, refresh, password reset, logout.
//!
//! A refresh token moves through `ISSUED -> ACTIVE -> EXPIRED | REVOKED`.
//! Refreshing issues a new access token only; the refresh token itself is
//! never rotated and stays valid until its own expiry, an explicit logout,
//! or a password reset (which revokes every session for the account).

use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::AuthError;
use super::store::{CreateAccountOutcome, CredentialStore};
use super::token::TokenCodec;

const USERNAME_MIN_CHARS: usize = 3;
const USERNAME_MAX_CHARS: usize = 20;
const PASSWORD_MIN_CHARS: usize = 6;
const PASSWORD_MAX_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub id: Uuid,
    pub username: String,
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub account: AccountSummary,
    pub access_token: String,
    pub refresh_token: String,
}

/// Stateful core of the auth subsystem.
///
/// Holds no mutable in-process state; all session state lives in the
/// credential store, so concurrent requests need no coordination here.
pub struct SessionService {
    codec: TokenCodec,
    store: Arc<dyn CredentialStore>,
    bcrypt_cost: u32,
}

impl SessionService {
    #[must_use]
    pub fn new(codec: TokenCodec, store: Arc<dyn CredentialStore>, bcrypt_cost: u32) -> Self {
        Self {
            codec,
            store,
            bcrypt_cost,
        }
    }

    /// Create a new account with a one-way hashed password.
    ///
    /// # Errors
    /// `DuplicateAccount` if the username is taken; `Validation` for
    /// out-of-bounds username or password lengths.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AccountSummary, AuthError> {
        validate_username(username)?;
        validate_password(password)?;

        let password_hash = self.hash_password(password.to_string()).await?;

        match self.store.create_account(username, &password_hash).await? {
            CreateAccountOutcome::Created(record) => {
                info!(account_id = %record.id, "account registered");
                Ok(AccountSummary {
                    id: record.id,
                    username: record.username,
                    created_at: record.created_at,
                })
            }
            CreateAccountOutcome::DuplicateUsername => Err(AuthError::DuplicateAccount),
        }
    }

    /// Verify credentials and issue a fresh token pair.
    ///
    /// Unknown usernames and wrong passwords both map to
    /// `InvalidCredentials`, so login failures cannot be used to probe for
    /// existing accounts.
    ///
    /// # Errors
    /// `InvalidCredentials`, or an internal error from the store/codec.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let Some(account) = self.store.find_account_by_username(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .verify_password(password.to_string(), account.password_hash.clone())
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self
            .codec
            .issue_access(account.id, &account.username)
            .context("failed to issue access token")?;
        let refresh_token = self
            .codec
            .issue_refresh(account.id, &account.username)
            .context("failed to issue refresh token")?;

        let expires_at = Utc::now() + Duration::seconds(self.codec.refresh_ttl_seconds());
        self.store
            .create_refresh_token(&refresh_token, account.id, expires_at)
            .await?;

        info!(account_id = %account.id, "session issued");

        Ok(LoginOutcome {
            account: AccountSummary {
                id: account.id,
                username: account.username,
                created_at: account.created_at,
            },
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Acceptance requires all three checks to pass: signature verification,
    /// presence in the store, and an unexpired `expires_at`. Every failure
    /// collapses to `RefreshTokenInvalid`; which check failed is logged only.
    /// A stored-but-expired row is deleted on discovery.
    ///
    /// # Errors
    /// `RefreshTokenInvalid`, or an internal error from the store/codec.
    pub async fn refresh_access(&self, refresh_token: &str) -> Result<String, AuthError> {
        if let Err(err) = self.codec.verify_refresh(refresh_token) {
            debug!("refresh token rejected by codec: {err}");
            return Err(AuthError::RefreshTokenInvalid);
        }

        let Some(record) = self.store.find_refresh_token(refresh_token).await? else {
            debug!("refresh token not found in store");
            return Err(AuthError::RefreshTokenInvalid);
        };

        if record.expires_at <= Utc::now() {
            // Lazy cleanup: the row is dead, remove it before rejecting.
            self.store.delete_refresh_token(refresh_token).await?;
            debug!(account_id = %record.account_id, "expired refresh token purged");
            return Err(AuthError::RefreshTokenInvalid);
        }

        let Some(account) = self.store.find_account_by_id(record.account_id).await? else {
            debug!("refresh token owner no longer exists");
            return Err(AuthError::RefreshTokenInvalid);
        };

        let access_token = self
            .codec
            .issue_access(account.id, &account.username)
            .context("failed to issue access token")?;

        info!(account_id = %account.id, "access token refreshed");

        Ok(access_token)
    }

    /// Change the account password and revoke every outstanding session.
    ///
    /// This is the only operation that revokes sessions: all refresh tokens
    /// owned by the account are deleted, forcing re-login on all devices.
    ///
    /// # Errors
    /// `AccountNotFound`, `InvalidOldPassword`, `Validation`, or an internal
    /// error from the store.
    pub async fn reset_password(
        &self,
        account_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let Some(account) = self.store.find_account_by_id(account_id).await? else {
            return Err(AuthError::AccountNotFound);
        };

        if !self
            .verify_password(old_password.to_string(), account.password_hash.clone())
            .await?
        {
            return Err(AuthError::InvalidOldPassword);
        }

        validate_password(new_password)?;

        let password_hash = self.hash_password(new_password.to_string()).await?;
        self.store
            .update_account_password(account_id, &password_hash)
            .await?;
        self.store
            .delete_all_refresh_tokens_for_account(account_id)
            .await?;

        info!(account_id = %account_id, "password reset, all sessions revoked");

        Ok(())
    }

    /// Delete exactly one refresh-token row. Absence is not an error.
    ///
    /// # Errors
    /// Only internal store failures.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.store.delete_refresh_token(refresh_token).await?;
        info!("session logged out");
        Ok(())
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let cost = self.bcrypt_cost;
        // bcrypt is CPU-bound; keep it off the async worker threads.
        let hash = task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("password hashing task failed")?
            .context("failed to hash password")?;
        Ok(hash)
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let valid = task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .context("password verification task failed")?
            .context("failed to verify password")?;
        Ok(valid)
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    let chars = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&chars) {
        return Err(AuthError::Validation(format!(
            "username must be {USERNAME_MIN_CHARS}-{USERNAME_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    let chars = password.chars().count();
    if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&chars) {
        return Err(AuthError::Validation(format!(
            "password must be {PASSWORD_MIN_CHARS}-{PASSWORD_MAX_CHARS} characters"
        )));
    }
    Ok(())
}
