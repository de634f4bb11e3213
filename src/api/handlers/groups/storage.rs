//! Postgres access for groups. Every statement is scoped to the owning
//! account; a group id from another account behaves as if it did not exist.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub task_count: i64,
}

pub struct GroupStore {
    pool: PgPool,
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> GroupRecord {
    GroupRecord {
        id: row.get("id"),
        name: row.get("name"),
        color: row.get("color"),
        created_at: row.get("created_at"),
        task_count: row.get("task_count"),
    }
}

impl GroupStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, account_id: Uuid) -> Result<Vec<GroupRecord>> {
        let query = r"
            SELECT g.id, g.name, g.color, g.created_at,
                   COUNT(t.id) AS task_count
            FROM groups g
            LEFT JOIN tasks t ON t.group_id = g.id
            WHERE g.account_id = $1
            GROUP BY g.id
            ORDER BY g.created_at ASC
        ";
        let rows = sqlx::query(query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to list groups")?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    pub async fn find(&self, account_id: Uuid, group_id: Uuid) -> Result<Option<GroupRecord>> {
        let query = r"
            SELECT g.id, g.name, g.color, g.created_at,
                   COUNT(t.id) AS task_count
            FROM groups g
            LEFT JOIN tasks t ON t.group_id = g.id
            WHERE g.account_id = $1 AND g.id = $2
            GROUP BY g.id
        ";
        let row = sqlx::query(query)
            .bind(account_id)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup group")?;

        Ok(row.as_ref().map(record_from_row))
    }

    /// Existence check without the task count aggregate.
    pub async fn exists(&self, account_id: Uuid, group_id: Uuid) -> Result<bool> {
        let query = r"
            SELECT 1 AS present
            FROM groups
            WHERE account_id = $1 AND id = $2
        ";
        let row = sqlx::query(query)
            .bind(account_id)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to check group ownership")?;

        Ok(row.is_some())
    }

    pub async fn create(
        &self,
        account_id: Uuid,
        name: &str,
        color: Option<&str>,
    ) -> Result<GroupRecord> {
        let query = r"
            INSERT INTO groups (id, account_id, name, color)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, color, created_at
        ";
        let id = Uuid::now_v7();
        let row = sqlx::query(query)
            .bind(id)
            .bind(account_id)
            .bind(name)
            .bind(color)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to create group")?;

        Ok(GroupRecord {
            id: row.get("id"),
            name: row.get("name"),
            color: row.get("color"),
            created_at: row.get("created_at"),
            task_count: 0,
        })
    }

    pub async fn update(
        &self,
        account_id: Uuid,
        group_id: Uuid,
        name: &str,
        color: Option<&str>,
    ) -> Result<()> {
        let query = r"
            UPDATE groups
            SET name = $3, color = $4
            WHERE account_id = $1 AND id = $2
        ";
        sqlx::query(query)
            .bind(account_id)
            .bind(group_id)
            .bind(name)
            .bind(color)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update group")?;

        Ok(())
    }

    /// Tasks in the group survive; their `group_id` is nulled by the schema.
    pub async fn delete(&self, account_id: Uuid, group_id: Uuid) -> Result<()> {
        let query = r"
            DELETE FROM groups
            WHERE account_id = $1 AND id = $2
        ";
        sqlx::query(query)
            .bind(account_id)
            .bind(group_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete group")?;

        Ok(())
    }
}
