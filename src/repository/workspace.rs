//! Workspace repository

use crate::domain::{
    Account, Metadata, Role, StringUuid, UpdateWorkspaceInput, Workspace, WorkspaceStatus,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

const WORKSPACE_COLUMNS: &str =
    "id, name, slug, status, is_active, settings, created_at, updated_at, created_by_id, updated_by_id";

/// First administrator created together with a new workspace.
#[derive(Debug, Clone)]
pub struct NewWorkspaceAdmin {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Insert the workspace and its first admin account in one transaction.
    async fn create(
        &self,
        name: &str,
        slug: &str,
        admin: &NewWorkspaceAdmin,
        actor_id: Option<StringUuid>,
    ) -> Result<(Workspace, Account)>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Workspace>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Workspace>>;
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Workspace>>;
    async fn count(&self) -> Result<i64>;
    async fn update(
        &self,
        id: StringUuid,
        input: &UpdateWorkspaceInput,
        actor_id: StringUuid,
    ) -> Result<Workspace>;
    async fn set_status(
        &self,
        id: StringUuid,
        status: WorkspaceStatus,
        actor_id: StringUuid,
    ) -> Result<Workspace>;
}

pub struct WorkspaceRepositoryImpl {
    pool: MySqlPool,
}

impl WorkspaceRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceRepository for WorkspaceRepositoryImpl {
    async fn create(
        &self,
        name: &str,
        slug: &str,
        admin: &NewWorkspaceAdmin,
        actor_id: Option<StringUuid>,
    ) -> Result<(Workspace, Account)> {
        let workspace_id = StringUuid::new_v4();
        let admin_id = StringUuid::new_v4();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO workspaces (id, name, slug, status, is_active, settings, created_at, updated_at, created_by_id, updated_by_id)
            VALUES (?, ?, ?, ?, true, ?, NOW(), NOW(), ?, ?)
            "#,
        )
        .bind(workspace_id)
        .bind(name)
        .bind(slug)
        .bind(WorkspaceStatus::Active)
        .bind(sqlx::types::Json(Metadata::new()))
        .bind(actor_id)
        .bind(actor_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, full_name, password_hash, role, is_active, workspace_id, department_id, metadata, created_at, updated_at, created_by_id, updated_by_id)
            VALUES (?, ?, ?, ?, ?, true, ?, NULL, ?, NOW(), NOW(), ?, ?)
            "#,
        )
        .bind(admin_id)
        .bind(&admin.email)
        .bind(&admin.full_name)
        .bind(&admin.password_hash)
        .bind(Role::WorkspaceAdmin)
        .bind(workspace_id)
        .bind(sqlx::types::Json(Metadata::new()))
        .bind(actor_id)
        .bind(actor_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let workspace = self
            .find_by_id(workspace_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create workspace")))?;
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, full_name, password_hash, role, is_active, workspace_id, department_id, metadata, created_at, updated_at, created_by_id, updated_by_id
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(admin_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((workspace, account))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Workspace>> {
        let workspace = sqlx::query_as::<_, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(workspace)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Workspace>> {
        let workspace = sqlx::query_as::<_, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(workspace)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Workspace>> {
        let workspaces = sqlx::query_as::<_, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces ORDER BY created_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(workspaces)
    }

    async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workspaces")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn update(
        &self,
        id: StringUuid,
        input: &UpdateWorkspaceInput,
        actor_id: StringUuid,
    ) -> Result<Workspace> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workspace {} not found", id)))?;

        let name = input.name.as_ref().unwrap_or(&existing.name);
        let status = input.status.unwrap_or(existing.status);
        let settings = input.settings.as_ref().unwrap_or(&existing.settings);

        sqlx::query(
            r#"
            UPDATE workspaces
            SET name = ?, status = ?, is_active = ?, settings = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(status)
        .bind(status == WorkspaceStatus::Active)
        .bind(sqlx::types::Json(settings))
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update workspace")))
    }

    async fn set_status(
        &self,
        id: StringUuid,
        status: WorkspaceStatus,
        actor_id: StringUuid,
    ) -> Result<Workspace> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET status = ?, is_active = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(status == WorkspaceStatus::Active)
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Workspace {} not found", id)));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update workspace")))
    }
}
