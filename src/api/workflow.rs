//! Department, rank, and request API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::api::{
    MessageResponse, PaginatedResponse, PaginationQuery, SuccessResponse, WorkspaceQuery,
};
use crate::domain::{
    CreateDepartmentInput, CreateRequestInput, RankInput, RequestFilter, RequestStatus, StringUuid,
    UpdateDepartmentInput, UpdateRequestInput,
};
use crate::error::Result;
use crate::middleware::Actor;
use crate::server::AppState;

// ---- Departments ----

/// Create department
pub async fn create_department(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Json(input): Json<CreateDepartmentInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let department = state
        .workflow
        .create_department(&actor.account, workspace_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(department))))
}

/// Get department by ID
pub async fn get_department(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let department = state
        .workflow
        .get_department(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(SuccessResponse::new(department)))
}

/// List departments
pub async fn list_departments(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let per_page = pagination.per_page(&state.config.pagination);
    let (departments, total) = state
        .workflow
        .list_departments(
            &actor.account,
            workspace_id,
            pagination.offset(per_page),
            per_page,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(
        departments,
        pagination.page,
        per_page,
        total,
    )))
}

/// Update department
pub async fn update_department(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
    Json(input): Json<UpdateDepartmentInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let department = state
        .workflow
        .update_department(&actor.account, workspace_id, id, input)
        .await?;
    Ok(Json(SuccessResponse::new(department)))
}

/// Delete department (blocked while it still has members or open requests)
pub async fn delete_department(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    state
        .workflow
        .delete_department(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(MessageResponse::new("Department deleted")))
}

// ---- Ranks ----

/// Add a rank to a department
pub async fn add_rank(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(department_id): Path<StringUuid>,
    Json(input): Json<RankInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let department = state
        .workflow
        .add_rank(&actor.account, workspace_id, department_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(department))))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRankRequest {
    pub name: Option<String>,
    pub order: Option<i32>,
}

/// Rename or reorder a rank
pub async fn update_rank(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path((department_id, rank_id)): Path<(StringUuid, String)>,
    Json(input): Json<UpdateRankRequest>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let department = state
        .workflow
        .update_rank(
            &actor.account,
            workspace_id,
            department_id,
            &rank_id,
            input.name,
            input.order,
        )
        .await?;
    Ok(Json(SuccessResponse::new(department)))
}

/// Remove a rank from a department
pub async fn remove_rank(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path((department_id, rank_id)): Path<(StringUuid, String)>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let department = state
        .workflow
        .remove_rank(&actor.account, workspace_id, department_id, &rank_id)
        .await?;
    Ok(Json(SuccessResponse::new(department)))
}

#[derive(Debug, Deserialize)]
pub struct AssignRankRequest {
    /// `null` clears the account's rank.
    pub rank_id: Option<String>,
}

/// Assign or clear an account's rank
pub async fn assign_account_rank(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(account_id): Path<StringUuid>,
    Json(input): Json<AssignRankRequest>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let account = state
        .workflow
        .assign_account_rank(
            &actor.account,
            workspace_id,
            account_id,
            input.rank_id.as_deref(),
        )
        .await?;
    Ok(Json(SuccessResponse::new(account)))
}

// ---- Requests ----

#[derive(Debug, Default, Deserialize)]
pub struct RequestListQuery {
    pub workspace_id: Option<StringUuid>,
    pub department_id: Option<StringUuid>,
    pub assignee_id: Option<StringUuid>,
}

/// Create request
pub async fn create_request(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Json(input): Json<CreateRequestInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let request = state
        .workflow
        .create_request(&actor.account, workspace_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(request))))
}

/// Get request by ID (out-of-scope rows read as missing)
pub async fn get_request(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let request = state
        .workflow
        .get_request(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(SuccessResponse::new(request)))
}

/// List requests visible to the caller
pub async fn list_requests(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<RequestListQuery>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let filter = RequestFilter {
        department_id: query.department_id,
        assignee_id: query.assignee_id,
        ..Default::default()
    };
    let per_page = pagination.per_page(&state.config.pagination);
    let (requests, total) = state
        .workflow
        .list_requests(
            &actor.account,
            workspace_id,
            filter,
            pagination.offset(per_page),
            per_page,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(
        requests,
        pagination.page,
        per_page,
        total,
    )))
}

/// List requests still in flight
pub async fn list_active_requests(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<RequestListQuery>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let filter = RequestFilter {
        department_id: query.department_id,
        assignee_id: query.assignee_id,
        ..Default::default()
    };
    let per_page = pagination.per_page(&state.config.pagination);
    let (requests, total) = state
        .workflow
        .list_active(
            &actor.account,
            workspace_id,
            filter,
            pagination.offset(per_page),
            per_page,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(
        requests,
        pagination.page,
        per_page,
        total,
    )))
}

/// List completed requests
pub async fn list_request_history(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<RequestListQuery>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let filter = RequestFilter {
        department_id: query.department_id,
        assignee_id: query.assignee_id,
        ..Default::default()
    };
    let per_page = pagination.per_page(&state.config.pagination);
    let (requests, total) = state
        .workflow
        .list_history(
            &actor.account,
            workspace_id,
            filter,
            pagination.offset(per_page),
            per_page,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(
        requests,
        pagination.page,
        per_page,
        total,
    )))
}

/// Update request fields
pub async fn update_request(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
    Json(input): Json<UpdateRequestInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let request = state
        .workflow
        .update_request(&actor.account, workspace_id, id, input)
        .await?;
    Ok(Json(SuccessResponse::new(request)))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequestBody {
    pub assignee_id: StringUuid,
}

/// Claim a request for an assignee. First writer wins.
pub async fn assign_request(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
    Json(input): Json<AssignRequestBody>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let request = state
        .workflow
        .assign_request(&actor.account, workspace_id, id, input.assignee_id)
        .await?;
    Ok(Json(SuccessResponse::new(request)))
}

/// Release a request back to the unassigned pool
pub async fn unassign_request(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let request = state
        .workflow
        .unassign_request(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(SuccessResponse::new(request)))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
    pub status: RequestStatus,
}

/// Move a request to a new lifecycle status
pub async fn set_request_status(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
    Json(input): Json<SetStatusBody>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let request = state
        .workflow
        .set_request_status(&actor.account, workspace_id, id, input.status)
        .await?;
    Ok(Json(SuccessResponse::new(request)))
}

/// Delete request
pub async fn delete_request(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    state
        .workflow
        .delete_request(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(MessageResponse::new("Request deleted")))
}
