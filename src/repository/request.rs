//! Work request repository

use crate::domain::{RequestFilter, RequestStatus, StringUuid, WorkRequest};
use crate::error::{AppError, Result};
use crate::policy::RowScope;
use async_trait::async_trait;
use sqlx::mysql::MySqlArguments;
use sqlx::MySqlPool;

const REQUEST_COLUMNS: &str = "id, title, description, status, priority, department_id, assignee_id, creator_id, workspace_id, metadata, created_at, updated_at, created_by_id, updated_by_id";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn insert(&self, request: &WorkRequest) -> Result<WorkRequest>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<WorkRequest>>;
    /// List rows visible under the given scope, newest first.
    async fn list(
        &self,
        workspace_id: StringUuid,
        scope: &RowScope,
        filter: &RequestFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<WorkRequest>>;
    async fn count(
        &self,
        workspace_id: StringUuid,
        scope: &RowScope,
        filter: &RequestFilter,
    ) -> Result<i64>;
    async fn update_fields(
        &self,
        request: &WorkRequest,
        actor_id: StringUuid,
    ) -> Result<WorkRequest>;
    /// Claim an unassigned request. Returns false when another assignee won
    /// the race, so callers can answer with a conflict instead of clobbering.
    async fn try_assign(
        &self,
        id: StringUuid,
        assignee_id: StringUuid,
        actor_id: StringUuid,
    ) -> Result<bool>;
    async fn unassign(&self, id: StringUuid, actor_id: StringUuid) -> Result<()>;
    /// Deletes the request. When the request was materialized from a form
    /// submission, the submission survives but its `request_id`
    /// back-reference is dropped in the same transaction.
    async fn delete(&self, id: StringUuid, linked_submission_id: Option<StringUuid>) -> Result<()>;
    /// Requests not yet Done that reference the department.
    async fn count_live_by_department(&self, department_id: StringUuid) -> Result<i64>;
}

pub struct RequestRepositoryImpl {
    pool: MySqlPool,
}

impl RequestRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn push_scope_sql(sql: &mut String, scope: &RowScope) {
    match scope {
        RowScope::Workspace => {}
        RowScope::DepartmentOrOwn { department_id, .. } => {
            if department_id.is_some() {
                sql.push_str(" AND (department_id = ? OR creator_id = ? OR assignee_id = ?)");
            } else {
                sql.push_str(" AND (creator_id = ? OR assignee_id = ?)");
            }
        }
        RowScope::OwnOnly { .. } => {
            sql.push_str(" AND (creator_id = ? OR assignee_id = ?)");
        }
    }
}

fn bind_scope<'q, O>(
    mut query: sqlx::query::QueryAs<'q, sqlx::MySql, O, MySqlArguments>,
    scope: &RowScope,
) -> sqlx::query::QueryAs<'q, sqlx::MySql, O, MySqlArguments> {
    match scope {
        RowScope::Workspace => {}
        RowScope::DepartmentOrOwn {
            department_id,
            account_id,
        } => {
            if let Some(department_id) = department_id {
                query = query.bind(*department_id);
            }
            query = query.bind(*account_id).bind(*account_id);
        }
        RowScope::OwnOnly { account_id } => {
            query = query.bind(*account_id).bind(*account_id);
        }
    }
    query
}

fn push_filter_sql(sql: &mut String, filter: &RequestFilter) {
    if filter.department_id.is_some() {
        sql.push_str(" AND department_id = ?");
    }
    if filter.assignee_id.is_some() {
        sql.push_str(" AND assignee_id = ?");
    }
    match filter.done {
        Some(true) => sql.push_str(" AND status = ?"),
        Some(false) => sql.push_str(" AND status <> ?"),
        None => {}
    }
}

fn bind_filter<'q, O>(
    mut query: sqlx::query::QueryAs<'q, sqlx::MySql, O, MySqlArguments>,
    filter: &RequestFilter,
) -> sqlx::query::QueryAs<'q, sqlx::MySql, O, MySqlArguments> {
    if let Some(department_id) = filter.department_id {
        query = query.bind(department_id);
    }
    if let Some(assignee_id) = filter.assignee_id {
        query = query.bind(assignee_id);
    }
    if filter.done.is_some() {
        query = query.bind(RequestStatus::Done);
    }
    query
}

#[async_trait]
impl RequestRepository for RequestRepositoryImpl {
    async fn insert(&self, request: &WorkRequest) -> Result<WorkRequest> {
        sqlx::query(
            r#"
            INSERT INTO work_requests (id, title, description, status, priority, department_id, assignee_id, creator_id, workspace_id, metadata, created_at, updated_at, created_by_id, updated_by_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NOW(), NOW(), ?, ?)
            "#,
        )
        .bind(request.id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.status)
        .bind(request.priority)
        .bind(request.department_id)
        .bind(request.assignee_id)
        .bind(request.creator_id)
        .bind(request.workspace_id)
        .bind(sqlx::types::Json(&request.metadata))
        .bind(request.created_by_id)
        .bind(request.updated_by_id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(request.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create request")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<WorkRequest>> {
        let request = sqlx::query_as::<_, WorkRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM work_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn list(
        &self,
        workspace_id: StringUuid,
        scope: &RowScope,
        filter: &RequestFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<WorkRequest>> {
        let mut sql =
            format!("SELECT {REQUEST_COLUMNS} FROM work_requests WHERE workspace_id = ?");
        push_scope_sql(&mut sql, scope);
        push_filter_sql(&mut sql, filter);
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, WorkRequest>(&sql).bind(workspace_id);
        query = bind_scope(query, scope);
        query = bind_filter(query, filter);
        let requests = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        Ok(requests)
    }

    async fn count(
        &self,
        workspace_id: StringUuid,
        scope: &RowScope,
        filter: &RequestFilter,
    ) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM work_requests WHERE workspace_id = ?");
        push_scope_sql(&mut sql, scope);
        push_filter_sql(&mut sql, filter);

        let mut query = sqlx::query_as::<_, (i64,)>(&sql).bind(workspace_id);
        query = bind_scope(query, scope);
        query = bind_filter(query, filter);
        let row = query.fetch_one(&self.pool).await?;

        Ok(row.0)
    }

    async fn update_fields(
        &self,
        request: &WorkRequest,
        actor_id: StringUuid,
    ) -> Result<WorkRequest> {
        let result = sqlx::query(
            r#"
            UPDATE work_requests
            SET title = ?, description = ?, status = ?, priority = ?, department_id = ?, metadata = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.status)
        .bind(request.priority)
        .bind(request.department_id)
        .bind(sqlx::types::Json(&request.metadata))
        .bind(actor_id)
        .bind(request.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Request {} not found",
                request.id
            )));
        }

        self.find_by_id(request.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update request")))
    }

    async fn try_assign(
        &self,
        id: StringUuid,
        assignee_id: StringUuid,
        actor_id: StringUuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE work_requests
            SET assignee_id = ?, status = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ? AND assignee_id IS NULL
            "#,
        )
        .bind(assignee_id)
        .bind(RequestStatus::Assigned)
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unassign(&self, id: StringUuid, actor_id: StringUuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE work_requests
            SET assignee_id = NULL, status = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(RequestStatus::New)
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Request {} not found", id)));
        }

        Ok(())
    }

    async fn delete(&self, id: StringUuid, linked_submission_id: Option<StringUuid>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM work_requests WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Request {} not found", id)));
        }

        if let Some(submission_id) = linked_submission_id {
            sqlx::query(
                r#"
                UPDATE form_submissions
                SET metadata = JSON_REMOVE(metadata, '$.request_id'), updated_at = NOW()
                WHERE id = ?
                "#,
            )
            .bind(submission_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_live_by_department(&self, department_id: StringUuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM work_requests WHERE department_id = ? AND status <> ?",
        )
        .bind(department_id)
        .bind(RequestStatus::Done)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}
