//! Audit log repository

use crate::domain::StringUuid;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, MySqlPool};

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub actor_id: Option<StringUuid>,
    pub workspace_id: Option<StringUuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<StringUuid>,
    #[sqlx(json)]
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an audit log entry
#[derive(Debug, Clone)]
pub struct CreateAuditLogInput {
    pub actor_id: Option<StringUuid>,
    pub workspace_id: Option<StringUuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<StringUuid>,
    pub detail: Option<serde_json::Value>,
}

/// Audit log query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQuery {
    pub actor_id: Option<StringUuid>,
    pub workspace_id: Option<StringUuid>,
    pub resource_type: Option<String>,
    pub resource_id: Option<StringUuid>,
    pub action: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn create(&self, input: &CreateAuditLogInput) -> Result<()>;
    async fn find(&self, query: &AuditLogQuery) -> Result<Vec<AuditLog>>;
    async fn count(&self, query: &AuditLogQuery) -> Result<i64>;
}

pub struct AuditRepositoryImpl {
    pool: MySqlPool,
}

impl AuditRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn push_query_sql(sql: &mut String, query: &AuditLogQuery) {
    if query.actor_id.is_some() {
        sql.push_str(" AND actor_id = ?");
    }
    if query.workspace_id.is_some() {
        sql.push_str(" AND workspace_id = ?");
    }
    if query.resource_type.is_some() {
        sql.push_str(" AND resource_type = ?");
    }
    if query.resource_id.is_some() {
        sql.push_str(" AND resource_id = ?");
    }
    if query.action.is_some() {
        sql.push_str(" AND action = ?");
    }
    if query.from_date.is_some() {
        sql.push_str(" AND created_at >= ?");
    }
    if query.to_date.is_some() {
        sql.push_str(" AND created_at <= ?");
    }
}

fn bind_query<'q, O>(
    mut builder: sqlx::query::QueryAs<'q, sqlx::MySql, O, sqlx::mysql::MySqlArguments>,
    query: &'q AuditLogQuery,
) -> sqlx::query::QueryAs<'q, sqlx::MySql, O, sqlx::mysql::MySqlArguments> {
    if let Some(actor_id) = query.actor_id {
        builder = builder.bind(actor_id);
    }
    if let Some(workspace_id) = query.workspace_id {
        builder = builder.bind(workspace_id);
    }
    if let Some(ref resource_type) = query.resource_type {
        builder = builder.bind(resource_type);
    }
    if let Some(resource_id) = query.resource_id {
        builder = builder.bind(resource_id);
    }
    if let Some(ref action) = query.action {
        builder = builder.bind(action);
    }
    if let Some(from_date) = query.from_date {
        builder = builder.bind(from_date);
    }
    if let Some(to_date) = query.to_date {
        builder = builder.bind(to_date);
    }
    builder
}

#[async_trait]
impl AuditRepository for AuditRepositoryImpl {
    async fn create(&self, input: &CreateAuditLogInput) -> Result<()> {
        let detail = input
            .detail
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_id, workspace_id, action, resource_type, resource_id, detail, created_at)
            VALUES (?, ?, ?, ?, ?, ?, NOW())
            "#,
        )
        .bind(input.actor_id)
        .bind(input.workspace_id)
        .bind(&input.action)
        .bind(&input.resource_type)
        .bind(input.resource_id)
        .bind(detail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, query: &AuditLogQuery) -> Result<Vec<AuditLog>> {
        let mut sql = String::from(
            "SELECT id, actor_id, workspace_id, action, resource_type, resource_id, detail, created_at FROM audit_logs WHERE 1=1",
        );
        push_query_sql(&mut sql, query);
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut builder = sqlx::query_as::<_, AuditLog>(&sql);
        builder = bind_query(builder, query);

        let limit = query.limit.unwrap_or(50).min(100);
        let offset = query.offset.unwrap_or(0);
        let logs = builder
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }

    async fn count(&self, query: &AuditLogQuery) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM audit_logs WHERE 1=1");
        push_query_sql(&mut sql, query);

        let mut builder = sqlx::query_as::<_, (i64,)>(&sql);
        builder = bind_query(builder, query);

        let row = builder.fetch_one(&self.pool).await?;
        Ok(row.0)
    }
}
