//! Postgres access for tasks. All statements are scoped to the owning
//! account. Rows carry the group name and color so task responses do not
//! need a second round trip.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{Priority, SortField, SortOrder};

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub group_id: Option<Uuid>,
    pub group_name: Option<String>,
    pub group_color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct TaskStore {
    pool: PgPool,
}

const SELECT_COLUMNS: &str = r"
    SELECT t.id, t.title, t.description, t.completed, t.priority,
           t.group_id, g.name AS group_name, g.color AS group_color,
           t.created_at, t.updated_at
    FROM tasks t
    LEFT JOIN groups g ON g.id = t.group_id
";

/// ORDER BY fragment for a sort request. Priority sorts by severity, not
/// by the lexical order of the stored labels.
const fn order_clause(field: SortField, order: SortOrder) -> &'static str {
    match (field, order) {
        (SortField::CreatedAt, SortOrder::Asc) => "t.created_at ASC",
        (SortField::CreatedAt, SortOrder::Desc) => "t.created_at DESC",
        (SortField::UpdatedAt, SortOrder::Asc) => "t.updated_at ASC",
        (SortField::UpdatedAt, SortOrder::Desc) => "t.updated_at DESC",
        (SortField::Completed, SortOrder::Asc) => "t.completed ASC",
        (SortField::Completed, SortOrder::Desc) => "t.completed DESC",
        (SortField::Priority, SortOrder::Asc) => {
            "CASE t.priority WHEN 'LOW' THEN 0 WHEN 'MEDIUM' THEN 1 ELSE 2 END ASC"
        }
        (SortField::Priority, SortOrder::Desc) => {
            "CASE t.priority WHEN 'LOW' THEN 0 WHEN 'MEDIUM' THEN 1 ELSE 2 END DESC"
        }
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

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<TaskRecord> {
    let priority: String = row.get("priority");
    let priority = Priority::parse(&priority)
        .with_context(|| format!("unknown priority label in storage: {priority}"))?;

    Ok(TaskRecord {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        completed: row.get("completed"),
        priority,
        group_id: row.get("group_id"),
        group_name: row.get("group_name"),
        group_color: row.get("group_color"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl TaskStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        account_id: Uuid,
        sort_field: SortField,
        sort_order: SortOrder,
    ) -> Result<Vec<TaskRecord>> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE t.account_id = $1 ORDER BY {}",
            order_clause(sort_field, sort_order)
        );
        let rows = sqlx::query(&query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to list tasks")?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn find(&self, account_id: Uuid, task_id: Uuid) -> Result<Option<TaskRecord>> {
        let query = format!("{SELECT_COLUMNS} WHERE t.account_id = $1 AND t.id = $2");
        let row = sqlx::query(&query)
            .bind(account_id)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup task")?;

        row.as_ref().map(record_from_row).transpose()
    }

    pub async fn create(
        &self,
        account_id: Uuid,
        title: &str,
        description: Option<&str>,
        priority: Priority,
        group_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let query = r"
            INSERT INTO tasks (id, account_id, title, description, priority, group_id)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let id = Uuid::now_v7();
        sqlx::query(query)
            .bind(id)
            .bind(account_id)
            .bind(title)
            .bind(description)
            .bind(priority.as_str())
            .bind(group_id)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to create task")?;

        Ok(id)
    }

    /// Full-row write; callers read first and merge the partial update.
    pub async fn update(&self, account_id: Uuid, record: &TaskRecord) -> Result<()> {
        let query = r"
            UPDATE tasks
            SET title = $3, description = $4, completed = $5,
                priority = $6, group_id = $7, updated_at = NOW()
            WHERE account_id = $1 AND id = $2
        ";
        sqlx::query(query)
            .bind(account_id)
            .bind(record.id)
            .bind(&record.title)
            .bind(&record.description)
            .bind(record.completed)
            .bind(record.priority.as_str())
            .bind(record.group_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update task")?;

        Ok(())
    }

    pub async fn delete(&self, account_id: Uuid, task_id: Uuid) -> Result<()> {
        let query = r"
            DELETE FROM tasks
            WHERE account_id = $1 AND id = $2
        ";
        sqlx::query(query)
            .bind(account_id)
            .bind(task_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete task")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_sorts_by_severity() {
        let clause = order_clause(SortField::Priority, SortOrder::Asc);
        assert!(clause.contains("WHEN 'LOW' THEN 0"));
        assert!(clause.ends_with("ASC"));
    }

    #[test]
    fn default_sort_is_newest_first() {
        let clause = order_clause(SortField::default(), SortOrder::default());
        assert_eq!(clause, "t.created_at DESC");
    }
}
