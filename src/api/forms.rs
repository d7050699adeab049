//! Form template and submission API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::api::{
    MessageResponse, PaginatedResponse, PaginationQuery, SuccessResponse, WorkspaceQuery,
};
use crate::domain::{CreateTemplateInput, StringUuid, SubmitFormInput, UpdateTemplateInput};
use crate::error::Result;
use crate::middleware::Actor;
use crate::server::AppState;

// ---- Templates ----

/// Create form template
pub async fn create_template(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Json(input): Json<CreateTemplateInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let template = state
        .forms
        .create_template(&actor.account, workspace_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(template))))
}

/// Get form template by ID
pub async fn get_template(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let template = state
        .forms
        .get_template(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(SuccessResponse::new(template)))
}

/// List form templates
pub async fn list_templates(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let per_page = pagination.per_page(&state.config.pagination);
    let (templates, total) = state
        .forms
        .list_templates(
            &actor.account,
            workspace_id,
            pagination.offset(per_page),
            per_page,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(
        templates,
        pagination.page,
        per_page,
        total,
    )))
}

/// Update form template
pub async fn update_template(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
    Json(input): Json<UpdateTemplateInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let template = state
        .forms
        .update_template(&actor.account, workspace_id, id, input)
        .await?;
    Ok(Json(SuccessResponse::new(template)))
}

/// Delete form template (blocked while submissions reference it)
pub async fn delete_template(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    state
        .forms
        .delete_template(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(MessageResponse::new("Form template deleted")))
}

// ---- Submissions ----

/// Submit a form. When the template bridges to the request pipeline, the
/// materialized request is created atomically with the submission.
pub async fn submit(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(template_id): Path<StringUuid>,
    Json(input): Json<SubmitFormInput>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let submission = state
        .forms
        .submit(&actor.account, workspace_id, template_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(submission))))
}

/// List submissions for a template
pub async fn list_submissions(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(template_id): Path<StringUuid>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let per_page = pagination.per_page(&state.config.pagination);
    let (submissions, total) = state
        .forms
        .list_submissions(
            &actor.account,
            workspace_id,
            template_id,
            pagination.offset(per_page),
            per_page,
        )
        .await?;
    Ok(Json(PaginatedResponse::new(
        submissions,
        pagination.page,
        per_page,
        total,
    )))
}

/// Get submission by ID
pub async fn get_submission(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    let submission = state
        .forms
        .get_submission(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(SuccessResponse::new(submission)))
}

/// Delete submission
pub async fn delete_submission(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WorkspaceQuery>,
    Path(id): Path<StringUuid>,
) -> Result<impl IntoResponse> {
    let workspace_id = actor.workspace(query.workspace_id)?;
    state
        .forms
        .delete_submission(&actor.account, workspace_id, id)
        .await?;
    Ok(Json(MessageResponse::new("Submission deleted")))
}
