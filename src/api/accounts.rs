//! Account API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::api::{MessageResponse, PaginatedResponse, PaginationQuery, SuccessResponse};
use crate::domain::{ChangeRoleInput, CreateAccountInput, StringUuid, UpdateAccountInput};
use crate::error::Result;
use crate::middleware::Actor;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AccountListQuery {
    pub workspace_id: Option<StringUuid>,
    pub department_id: Option<StringUuid>,
}

/// Create account
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AccountListQuery>,
    Json(input): Json<CreateAccountInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id.or(input.workspace_id))?;
    let account = state
        .accounts
        .create(&actor.account, workspace_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(account))))
}

/// Get account by ID
pub async fn get(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let account = state.accounts.get(&actor.account, id).await?;
    Ok(Json(SuccessResponse::new(account)))
}

/// List accounts within a workspace, optionally filtered by department
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AccountListQuery>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let per_page = pagination.per_page(&state.config.pagination);
    let (accounts, total) = state
        .accounts
        .list(
            &actor.account,
            workspace_id,
            query.department_id,
            pagination.offset(per_page),
            per_page,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(
        accounts,
        pagination.page,
        per_page,
        total,
    )))
}

/// Update account profile fields
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
    Json(input): Json<UpdateAccountInput>,
) -> Result<impl IntoResponse> {
    let account = state.accounts.update(&actor.account, id, input).await?;
    Ok(Json(SuccessResponse::new(account)))
}

/// Change account role
pub async fn change_role(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
    Json(input): Json<ChangeRoleInput>,
) -> Result<impl IntoResponse> {
    let account = state.accounts.change_role(&actor.account, id, input).await?;
    Ok(Json(SuccessResponse::new(account)))
}

/// Deactivate account (soft delete)
pub async fn deactivate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    state.accounts.deactivate(&actor.account, id).await?;
    Ok(Json(MessageResponse::new("Account deactivated")))
}

/// Reactivate a previously deactivated account
pub async fn reactivate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    state.accounts.reactivate(&actor.account, id).await?;
    Ok(Json(MessageResponse::new("Account reactivated")))
}
