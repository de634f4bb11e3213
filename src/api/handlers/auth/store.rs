//! Credential storage boundary: accounts and persisted refresh tokens.
//!
//! The session service only sees the [`CredentialStore`] trait. Production
//! uses [`PgCredentialStore`]; tests use [`MemoryCredentialStore`]. Every
//! operation is a single statement (or a single guarded mutation in the
//! in-memory case), so per-row and per-account-batch atomicity comes from
//! the store itself and the service needs no locking.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub account_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub enum CreateAccountOutcome {
    Created(AccountRecord),
    DuplicateUsername,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_account_by_username(&self, username: &str) -> Result<Option<AccountRecord>>;
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<AccountRecord>>;
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CreateAccountOutcome>;
    async fn update_account_password(&self, id: Uuid, password_hash: &str) -> Result<()>;
    async fn create_refresh_token(
        &self,
        token: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>>;
    /// Deleting an absent token is not an error (logout is idempotent).
    async fn delete_refresh_token(&self, token: &str) -> Result<()>;
    async fn delete_all_refresh_tokens_for_account(&self, account_id: Uuid) -> Result<()>;
}

/// Postgres-backed credential store.
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_account_by_username(&self, username: &str) -> Result<Option<AccountRecord>> {
        let query = r"
            SELECT id, username, password_hash, created_at
            FROM accounts
            WHERE username = $1
        ";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup account by username")?;

        Ok(row.map(|row| AccountRecord {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }))
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<AccountRecord>> {
        let query = r"
            SELECT id, username, password_hash, created_at
            FROM accounts
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup account by id")?;

        Ok(row.map(|row| AccountRecord {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }))
    }

    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CreateAccountOutcome> {
        let query = r"
            INSERT INTO accounts (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING created_at
        ";
        let id = Uuid::now_v7();
        let row = sqlx::query(query)
            .bind(id)
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(CreateAccountOutcome::Created(AccountRecord {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                created_at: row.get("created_at"),
            })),
            Err(err) if is_unique_violation(&err) => Ok(CreateAccountOutcome::DuplicateUsername),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn update_account_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let query = r"
            UPDATE accounts
            SET password_hash = $2
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update account password")?;
        Ok(())
    }

    async fn create_refresh_token(
        &self,
        token: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r"
            INSERT INTO refresh_tokens (token, account_id, expires_at)
            VALUES ($1, $2, $3)
        ";
        sqlx::query(query)
            .bind(token)
            .bind(account_id)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert refresh token")?;
        Ok(())
    }

    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        let query = r"
            SELECT token, account_id, expires_at
            FROM refresh_tokens
            WHERE token = $1
        ";
        let row = sqlx::query(query)
            .bind(token)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup refresh token")?;

        Ok(row.map(|row| RefreshTokenRecord {
            token: row.get("token"),
            account_id: row.get("account_id"),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<()> {
        let query = "DELETE FROM refresh_tokens WHERE token = $1";
        sqlx::query(query)
            .bind(token)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete refresh token")?;
        Ok(())
    }

    async fn delete_all_refresh_tokens_for_account(&self, account_id: Uuid) -> Result<()> {
        let query = "DELETE FROM refresh_tokens WHERE account_id = $1";
        sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete refresh tokens for account")?;
        Ok(())
    }
}

/// In-memory credential store for tests and local experiments.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<Uuid, AccountRecord>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means another test panicked; the data is fine.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_account_by_username(&self, username: &str) -> Result<Option<AccountRecord>> {
        let inner = self.lock();
        Ok(inner
            .accounts
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<AccountRecord>> {
        Ok(self.lock().accounts.get(&id).cloned())
    }

    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<CreateAccountOutcome> {
        let mut inner = self.lock();
        if inner
            .accounts
            .values()
            .any(|account| account.username == username)
        {
            return Ok(CreateAccountOutcome::DuplicateUsername);
        }
        let record = AccountRecord {
            id: Uuid::now_v7(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.accounts.insert(record.id, record.clone());
        Ok(CreateAccountOutcome::Created(record))
    }

    async fn update_account_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        if let Some(account) = self.lock().accounts.get_mut(&id) {
            account.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn create_refresh_token(
        &self,
        token: &str,
        account_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.lock().refresh_tokens.insert(
            token.to_string(),
            RefreshTokenRecord {
                token: token.to_string(),
                account_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        Ok(self.lock().refresh_tokens.get(token).cloned())
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<()> {
        self.lock().refresh_tokens.remove(token);
        Ok(())
    }

    async fn delete_all_refresh_tokens_for_account(&self, account_id: Uuid) -> Result<()> {
        self.lock()
            .refresh_tokens
            .retain(|_, record| record.account_id != account_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_account_roundtrip() {
        let store = MemoryCredentialStore::new();
        let outcome = store.create_account("alice", "hash").await.unwrap();
        let CreateAccountOutcome::Created(record) = outcome else {
            panic!("expected creation");
        };

        let by_name = store
            .find_account_by_username("alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, record.id);

        let dup = store.create_account("alice", "hash2").await.unwrap();
        assert!(matches!(dup, CreateAccountOutcome::DuplicateUsername));
    }

    #[tokio::test]
    async fn memory_store_refresh_token_lifecycle() {
        let store = MemoryCredentialStore::new();
        let account_id = Uuid::now_v7();
        let expires = Utc::now() + chrono::Duration::days(7);

        store
            .create_refresh_token("tok-1", account_id, expires)
            .await
            .unwrap();
        store
            .create_refresh_token("tok-2", account_id, expires)
            .await
            .unwrap();

        assert!(store.find_refresh_token("tok-1").await.unwrap().is_some());

        store.delete_refresh_token("tok-1").await.unwrap();
        assert!(store.find_refresh_token("tok-1").await.unwrap().is_none());
        // Deleting again is a no-op.
        store.delete_refresh_token("tok-1").await.unwrap();

        store
            .delete_all_refresh_tokens_for_account(account_id)
            .await
            .unwrap();
        assert!(store.find_refresh_token("tok-2").await.unwrap().is_none());
    }
}
