//! Department repository

use crate::domain::{
    CreateDepartmentInput, Department, Metadata, StringUuid, UpdateDepartmentInput,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

const DEPARTMENT_COLUMNS: &str =
    "id, name, description, workspace_id, metadata, created_at, updated_at, created_by_id, updated_by_id";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    async fn create(
        &self,
        workspace_id: StringUuid,
        input: &CreateDepartmentInput,
        actor_id: StringUuid,
    ) -> Result<Department>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Department>>;
    async fn list(&self, workspace_id: StringUuid, offset: i64, limit: i64)
        -> Result<Vec<Department>>;
    async fn count(&self, workspace_id: StringUuid) -> Result<i64>;
    async fn update(
        &self,
        id: StringUuid,
        input: &UpdateDepartmentInput,
        actor_id: StringUuid,
    ) -> Result<Department>;
    /// Ranks live in the metadata column, so rank mutations land here.
    async fn set_metadata(
        &self,
        id: StringUuid,
        metadata: &Metadata,
        actor_id: StringUuid,
    ) -> Result<Department>;
    async fn delete(&self, id: StringUuid) -> Result<()>;
}

pub struct DepartmentRepositoryImpl {
    pool: MySqlPool,
}

impl DepartmentRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepartmentRepository for DepartmentRepositoryImpl {
    async fn create(
        &self,
        workspace_id: StringUuid,
        input: &CreateDepartmentInput,
        actor_id: StringUuid,
    ) -> Result<Department> {
        let id = StringUuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO departments (id, name, description, workspace_id, metadata, created_at, updated_at, created_by_id, updated_by_id)
            VALUES (?, ?, ?, ?, ?, NOW(), NOW(), ?, ?)
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(workspace_id)
        .bind(sqlx::types::Json(Metadata::new()))
        .bind(actor_id)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create department")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Department>> {
        let department = sqlx::query_as::<_, Department>(&format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(department)
    }

    async fn list(
        &self,
        workspace_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Department>> {
        let departments = sqlx::query_as::<_, Department>(&format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE workspace_id = ? ORDER BY name ASC LIMIT ? OFFSET ?"
        ))
        .bind(workspace_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(departments)
    }

    async fn count(&self, workspace_id: StringUuid) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM departments WHERE workspace_id = ?")
                .bind(workspace_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    async fn update(
        &self,
        id: StringUuid,
        input: &UpdateDepartmentInput,
        actor_id: StringUuid,
    ) -> Result<Department> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Department {} not found", id)))?;

        let name = input.name.as_ref().unwrap_or(&existing.name);
        let description = input.description.as_ref().or(existing.description.as_ref());

        sqlx::query(
            r#"
            UPDATE departments
            SET name = ?, description = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update department")))
    }

    async fn set_metadata(
        &self,
        id: StringUuid,
        metadata: &Metadata,
        actor_id: StringUuid,
    ) -> Result<Department> {
        let result = sqlx::query(
            r#"
            UPDATE departments
            SET metadata = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(sqlx::types::Json(metadata))
        .bind(actor_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Department {} not found", id)));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update department")))
    }

    async fn delete(&self, id: StringUuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM departments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Department {} not found", id)));
        }

        Ok(())
    }
}
