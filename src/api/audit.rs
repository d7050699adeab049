//! Audit log API handlers

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::{PaginatedResponse, PaginationQuery};
use crate::domain::StringUuid;
use crate::error::Result;
use crate::middleware::Actor;
use crate::policy::{actions, require_permission};
use crate::repository::audit::AuditLogQuery;
use crate::repository::AuditRepository;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AuditListQuery {
    pub workspace_id: Option<StringUuid>,
    pub actor_id: Option<StringUuid>,
    pub resource_type: Option<String>,
    pub resource_id: Option<StringUuid>,
    pub action: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// List audit log entries. Non-operators are pinned to their own workspace;
/// operators may query any workspace or leave the filter open.
pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AuditListQuery>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    require_permission(&actor.account, actions::VIEW_AUDIT_LOGS)?;

    let workspace_id = if actor.account.role.is_operator() {
        query.workspace_id.or(actor.ambient_workspace)
    } else {
        Some(actor.workspace(query.workspace_id)?)
    };

    let per_page = pagination.per_page(&state.config.pagination);
    let repo_query = AuditLogQuery {
        actor_id: query.actor_id,
        workspace_id,
        resource_type: query.resource_type,
        resource_id: query.resource_id,
        action: query.action,
        from_date: query.from_date,
        to_date: query.to_date,
        offset: Some(pagination.offset(per_page)),
        limit: Some(per_page),
    };
    let entries = state.audit_repo.find(&repo_query).await?;
    let total = state.audit_repo.count(&repo_query).await?;

    Ok(Json(PaginatedResponse::new(
        entries,
        pagination.page,
        per_page,
        total,
    )))
}
