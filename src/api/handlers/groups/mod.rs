//! Task groups: user-defined buckets with a name and an optional color.

pub mod storage;
pub mod types;

use axum::{
    extract::{Extension, Path},
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
};
use storage::{GroupRecord, GroupStore};
use types::{CreateGroupRequest, GroupResponse, UpdateGroupRequest};

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("Group not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GroupError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GroupError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("internal error: {err:#}");
            return envelope::fail(self.status(), "internal server error");
        }
        envelope::fail(self.status(), &self.to_string())
    }
}

fn group_response(record: &GroupRecord) -> GroupResponse {
    GroupResponse {
        id: record.id.to_string(),
        name: record.name.clone(),
        color: record.color.clone(),
        created_at: record.created_at.to_rfc3339(),
        task_count: record.task_count,
    }
}

#[utoipa::path(
    get,
    path = "/api/groups",
    responses(
        (status = 200, description = "Groups with their task counts"),
        (status = 401, description = "Missing or invalid access token")
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
#[instrument(skip_all)]
pub async fn list_groups(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let store = GroupStore::new(pool);
    match store.list(principal.account_id).await {
        Ok(records) => {
            let groups: Vec<GroupResponse> = records.iter().map(group_response).collect();
            envelope::ok(groups)
        }
        Err(err) => GroupError::from(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 200, description = "Group created"),
        (status = 400, description = "Invalid name or color"),
        (status = 401, description = "Missing or invalid access token")
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
#[instrument(skip_all)]
pub async fn create_group(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    payload: Option<Json<CreateGroupRequest>>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match create(pool, principal.account_id, payload).await {
        Ok(group) => envelope::with_message(group, "group created"),
        Err(err) => err.into_response(),
    }
}

async fn create(
    pool: PgPool,
    account_id: Uuid,
    payload: Option<Json<CreateGroupRequest>>,
) -> Result<GroupResponse, GroupError> {
    let Some(Json(payload)) = payload else {
        return Err(GroupError::Validation("missing request body".to_string()));
    };

    types::validate_name(&payload.name).map_err(GroupError::Validation)?;
    if let Some(color) = &payload.color {
        types::validate_color(color).map_err(GroupError::Validation)?;
    }

    let store = GroupStore::new(pool);
    let record = store
        .create(account_id, &payload.name, payload.color.as_deref())
        .await?;

    info!(account_id = %account_id, group_id = %record.id, "group created");

    Ok(group_response(&record))
}

#[utoipa::path(
    put,
    path = "/api/groups/{id}",
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Group updated"),
        (status = 400, description = "Invalid name or color"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Group not found")
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
#[instrument(skip_all)]
pub async fn update_group(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Path(group_id): Path<Uuid>,
    payload: Option<Json<UpdateGroupRequest>>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    match update(pool, principal.account_id, group_id, payload).await {
        Ok(group) => envelope::with_message(group, "group updated"),
        Err(err) => err.into_response(),
    }
}

async fn update(
    pool: PgPool,
    account_id: Uuid,
    group_id: Uuid,
    payload: Option<Json<UpdateGroupRequest>>,
) -> Result<GroupResponse, GroupError> {
    let Some(Json(payload)) = payload else {
        return Err(GroupError::Validation("missing request body".to_string()));
    };

    let store = GroupStore::new(pool);
    let Some(mut record) = store.find(account_id, group_id).await? else {
        return Err(GroupError::NotFound);
    };

    if let Some(name) = payload.name {
        types::validate_name(&name).map_err(GroupError::Validation)?;
        record.name = name;
    }
    if let Some(color) = payload.color {
        types::validate_color(&color).map_err(GroupError::Validation)?;
        record.color = Some(color);
    }

    store
        .update(account_id, group_id, &record.name, record.color.as_deref())
        .await?;

    info!(account_id = %account_id, group_id = %group_id, "group updated");

    Ok(group_response(&record))
}

#[utoipa::path(
    delete,
    path = "/api/groups/{id}",
    responses(
        (status = 200, description = "Group deleted, its tasks detached"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Group not found")
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
#[instrument(skip_all)]
pub async fn delete_group(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Path(group_id): Path<Uuid>,
) -> Response {
    let principal = match gate::require_auth(&headers, &state) {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    let store = GroupStore::new(pool);
    let result = async {
        if !store.exists(principal.account_id, group_id).await? {
            return Err(GroupError::NotFound);
        }
        store.delete(principal.account_id, group_id).await?;
        Ok(())
    }
    .await;

    match result {
        Ok(()) => {
            info!(account_id = %principal.account_id, group_id = %group_id, "group deleted");
            envelope::ok_empty("group deleted")
        }
        Err(err) => err.into_response(),
    }
}
