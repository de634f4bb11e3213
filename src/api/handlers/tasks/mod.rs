//! Tasks (wire name `todos`): the unit of work users track.

pub mod storage;
pub mod types;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::api::handlers::{
    auth::{gate, state::AuthState},
    envelope,
    groups::storage::GroupStore,
};
use storage::{TaskRecord, TaskStore};
use types::{
    CreateTaskRequest, ListTasksQuery, TaskGroupInfo, TaskResponse, UpdateTaskRequest,
};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,

    #[error("Group not found")]
    GroupNotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TaskError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::GroupNotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("internal error: {err:#}");
            return envelope::fail(self.status(), "internal server error");
        }
        envelope::fail(self.status(), &self.to_string())
    }
}

fn task_response(record: &TaskRecord) -> TaskResponse {
    let group = match (&record.group_id, &record.group_name) {
        (Some(id), Some(name)) => Some(TaskGroupInfo {
            id: id.to_string(),
            name: name.clone(),
            color: record.group_color.clone(),
        }),
        _ => None,
    };

    TaskResponse {
        id: record.id.to_string(),
        title: record.title.clone(),
        description: record.description.clone(),
        completed: record.completed,
        priority: record.priority,
        group,
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
    }
}

/// A `group_id` supplied by the client must name a group the caller owns.
async fn check_group_ownership(
    pool: &PgPool,
    account_id: Uuid,
    group_id: Uuid,
) -> Result<(), TaskError> {
    let groups = GroupStore::new(pool.clone());
    if groups.exists(account_id, group_id).await? {
        Ok(())
    } else {
        Err(TaskError::GroupNotFound)
    }
}

#[utoipa::path(
    get,
    path = "/api/todos",
    params(
        ("sortField" = Option<String>, Query, description = "createdAt | updatedAt | completed | priority"),
        ("sortOrder" = Option<String>, Query, description = "asc | desc")
    ),
    responses(
        (status = 200, description = "The caller's tasks, sorted"),
        (status = 401, description = "Missing or invalid access token")
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
#[instrument(skip_all)]
pub async fn list_tasks(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Query(query): Query<ListTasksQuery>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let store = TaskStore::new(pool);
    let result = store
        .list(
            principal.account_id,
            query.sort_field.unwrap_or_default(),
            query.sort_order.unwrap_or_default(),
        )
        .await;

    match result {
        Ok(records) => {
            let tasks: Vec<TaskResponse> = records.iter().map(task_response).collect();
            envelope::ok(tasks)
        }
        Err(err) => TaskError::from(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/todos",
    request_body = CreateTaskRequest,
    responses(
        (status = 200, description = "Task created"),
        (status = 400, description = "Invalid title or description"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Group not found")
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
#[instrument(skip_all)]
pub async fn create_task(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    payload: Option<Json<CreateTaskRequest>>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match create(pool, principal.account_id, payload).await {
        Ok(task) => envelope::with_message(task, "task created"),
        Err(err) => err.into_response(),
    }
}

async fn create(
    pool: PgPool,
    account_id: Uuid,
    payload: Option<Json<CreateTaskRequest>>,
) -> Result<TaskResponse, TaskError> {
    let Some(Json(payload)) = payload else {
        return Err(TaskError::Validation("missing request body".to_string()));
    };

    types::validate_title(&payload.title).map_err(TaskError::Validation)?;
    if let Some(description) = &payload.description {
        types::validate_description(description).map_err(TaskError::Validation)?;
    }
    if let Some(group_id) = payload.group_id {
        check_group_ownership(&pool, account_id, group_id).await?;
    }

    let store = TaskStore::new(pool);
    let id = store
        .create(
            account_id,
            &payload.title,
            payload.description.as_deref(),
            payload.priority.unwrap_or_default(),
            payload.group_id,
        )
        .await?;

    info!(account_id = %account_id, task_id = %id, "task created");

    let record = store
        .find(account_id, id)
        .await?
        .ok_or(TaskError::NotFound)?;
    Ok(task_response(&record))
}

#[utoipa::path(
    put,
    path = "/api/todos/{id}",
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated"),
        (status = 400, description = "Invalid title or description"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Task or group not found")
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
#[instrument(skip_all)]
pub async fn update_task(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    payload: Option<Json<UpdateTaskRequest>>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match update(pool, principal.account_id, task_id, payload).await {
        Ok(task) => envelope::with_message(task, "task updated"),
        Err(err) => err.into_response(),
    }
}

async fn update(
    pool: PgPool,
    account_id: Uuid,
    task_id: Uuid,
    payload: Option<Json<UpdateTaskRequest>>,
) -> Result<TaskResponse, TaskError> {
    let Some(Json(payload)) = payload else {
        return Err(TaskError::Validation("missing request body".to_string()));
    };

    let store = TaskStore::new(pool.clone());
    let Some(mut record) = store.find(account_id, task_id).await? else {
        return Err(TaskError::NotFound);
    };

    if let Some(title) = payload.title {
        types::validate_title(&title).map_err(TaskError::Validation)?;
        record.title = title;
    }
    if let Some(description) = payload.description {
        types::validate_description(&description).map_err(TaskError::Validation)?;
        record.description = Some(description);
    }
    if let Some(completed) = payload.completed {
        record.completed = completed;
    }
    if let Some(priority) = payload.priority {
        record.priority = priority;
    }
    if let Some(group_id) = payload.group_id {
        if let Some(group_id) = group_id {
            check_group_ownership(&pool, account_id, group_id).await?;
        }
        record.group_id = group_id;
    }

    store.update(account_id, &record).await?;

    info!(account_id = %account_id, task_id = %task_id, "task updated");

    let record = store
        .find(account_id, task_id)
        .await?
        .ok_or(TaskError::NotFound)?;
    Ok(task_response(&record))
}

#[utoipa::path(
    patch,
    path = "/api/todos/{id}/toggle",
    responses(
        (status = 200, description = "Completion flag flipped"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
#[instrument(skip_all)]
pub async fn toggle_task(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let store = TaskStore::new(pool);
    let result = async {
        let Some(mut record) = store.find(principal.account_id, task_id).await? else {
            return Err(TaskError::NotFound);
        };
        record.completed = !record.completed;
        store.update(principal.account_id, &record).await?;
        let record = store
            .find(principal.account_id, task_id)
            .await?
            .ok_or(TaskError::NotFound)?;
        Ok(task_response(&record))
    }
    .await;

    match result {
        Ok(task) => {
            info!(account_id = %principal.account_id, task_id = %task_id, "task toggled");
            envelope::with_message(task, "task toggled")
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/todos/{id}",
    responses(
        (status = 200, description = "Task deleted"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer" = [])),
    tag = "todos"
)]
#[instrument(skip_all)]
pub async fn delete_task(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let store = TaskStore::new(pool);
    let result = async {
        if store.find(principal.account_id, task_id).await?.is_none() {
            return Err(TaskError::NotFound);
        }
        store.delete(principal.account_id, task_id).await?;
        Ok(())
    }
    .await;

    match result {
        Ok(()) => {
            info!(account_id = %principal.account_id, task_id = %task_id, "task deleted");
            envelope::ok_empty("task deleted")
        }
        Err(err) => err.into_response(),
    }
}
