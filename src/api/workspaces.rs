//! Workspace API handlers
//!
//! Workspace provisioning and lifecycle. All of these require the Operator
//! role except `get`, which any member may call for their own workspace.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::api::{MessageResponse, PaginatedResponse, PaginationQuery, SuccessResponse};
use crate::domain::{Account, CreateWorkspaceInput, StringUuid, UpdateWorkspaceInput, Workspace};
use crate::error::Result;
use crate::middleware::Actor;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedWorkspaceResponse {
    pub workspace: Workspace,
    pub admin: Account,
}

/// Create a workspace together with its first WorkspaceAdmin account
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateWorkspaceInput>,
) -> Result<impl IntoResponse> {
    let (workspace, admin) = state.workspaces.create(&actor.account, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::new(CreatedWorkspaceResponse {
            workspace,
            admin,
        })),
    ))
}

/// Get workspace by ID
pub async fn get(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace = state.workspaces.get(&actor.account, id).await?;
    Ok(Json(SuccessResponse::new(workspace)))
}

/// List workspaces
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let per_page = pagination.per_page(&state.config.pagination);
    let (workspaces, total) = state
        .workspaces
        .list(&actor.account, pagination.offset(per_page), per_page)
        .await?;
    Ok(Json(PaginatedResponse::new(
        workspaces,
        pagination.page,
        per_page,
        total,
    )))
}

/// Update workspace
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
    Json(input): Json<UpdateWorkspaceInput>,
) -> Result<impl IntoResponse> {
    let workspace = state.workspaces.update(&actor.account, id, input).await?;
    Ok(Json(SuccessResponse::new(workspace)))
}

/// Suspend workspace: members can no longer sign in or use existing tokens
pub async fn suspend(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace = state.workspaces.suspend(&actor.account, id).await?;
    Ok(Json(SuccessResponse::new(workspace)))
}

/// Resume a suspended workspace
pub async fn resume(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace = state.workspaces.resume(&actor.account, id).await?;
    Ok(Json(SuccessResponse::new(workspace)))
}

/// Archive workspace (terminal)
pub async fn archive(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    state.workspaces.archive(&actor.account, id).await?;
    Ok(Json(MessageResponse::new("Workspace archived")))
}
