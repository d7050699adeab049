//! Form template and submission repository

use crate::domain::{FormSubmission, FormTemplate, StringUuid, WorkRequest};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

const TEMPLATE_COLUMNS: &str =
    "id, name, fields, workspace_id, metadata, created_at, updated_at, created_by_id, updated_by_id";
const SUBMISSION_COLUMNS: &str =
    "id, template_id, data, metadata, created_at, updated_at, created_by_id, updated_by_id";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FormRepository: Send + Sync {
    async fn create_template(&self, template: &FormTemplate) -> Result<FormTemplate>;
    async fn find_template(&self, id: StringUuid) -> Result<Option<FormTemplate>>;
    async fn list_templates(
        &self,
        workspace_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FormTemplate>>;
    async fn count_templates(&self, workspace_id: StringUuid) -> Result<i64>;
    async fn update_template(&self, template: &FormTemplate) -> Result<FormTemplate>;
    async fn delete_template(&self, id: StringUuid) -> Result<()>;

    /// Insert a submission alone.
    async fn create_submission(&self, submission: &FormSubmission) -> Result<FormSubmission>;
    /// Insert the submission and its materialized request atomically, so a
    /// failed request insert never leaves an orphaned submission.
    async fn create_submission_with_request(
        &self,
        submission: &FormSubmission,
        request: &WorkRequest,
    ) -> Result<FormSubmission>;
    async fn find_submission(&self, id: StringUuid) -> Result<Option<FormSubmission>>;
    async fn list_submissions(
        &self,
        template_id: StringUuid,
        created_by: Option<StringUuid>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FormSubmission>>;
    async fn count_submissions(
        &self,
        template_id: StringUuid,
        created_by: Option<StringUuid>,
    ) -> Result<i64>;
    async fn update_submission(&self, submission: &FormSubmission) -> Result<FormSubmission>;
    /// Deletes the submission and, when given, its materialized request in
    /// one transaction. A linked request that no longer exists is not an
    /// error; the link may be stale.
    async fn delete_submission(
        &self,
        id: StringUuid,
        linked_request_id: Option<StringUuid>,
    ) -> Result<()>;
    async fn count_submissions_for_template(&self, template_id: StringUuid) -> Result<i64>;
}

pub struct FormRepositoryImpl {
    pool: MySqlPool,
}

impl FormRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FormRepository for FormRepositoryImpl {
    async fn create_template(&self, template: &FormTemplate) -> Result<FormTemplate> {
        sqlx::query(
            r#"
            INSERT INTO form_templates (id, name, fields, workspace_id, metadata, created_at, updated_at, created_by_id, updated_by_id)
            VALUES (?, ?, ?, ?, ?, NOW(), NOW(), ?, ?)
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(sqlx::types::Json(&template.fields))
        .bind(template.workspace_id)
        .bind(sqlx::types::Json(&template.metadata))
        .bind(template.created_by_id)
        .bind(template.updated_by_id)
        .execute(&self.pool)
        .await?;

        self.find_template(template.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create form template")))
    }

    async fn find_template(&self, id: StringUuid) -> Result<Option<FormTemplate>> {
        let template = sqlx::query_as::<_, FormTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM form_templates WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(template)
    }

    async fn list_templates(
        &self,
        workspace_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FormTemplate>> {
        let templates = sqlx::query_as::<_, FormTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM form_templates WHERE workspace_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(workspace_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(templates)
    }

    async fn count_templates(&self, workspace_id: StringUuid) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM form_templates WHERE workspace_id = ?")
                .bind(workspace_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    async fn update_template(&self, template: &FormTemplate) -> Result<FormTemplate> {
        let result = sqlx::query(
            r#"
            UPDATE form_templates
            SET name = ?, fields = ?, metadata = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&template.name)
        .bind(sqlx::types::Json(&template.fields))
        .bind(sqlx::types::Json(&template.metadata))
        .bind(template.updated_by_id)
        .bind(template.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Form template {} not found",
                template.id
            )));
        }

        self.find_template(template.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update form template")))
    }

    async fn delete_template(&self, id: StringUuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM form_templates WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Form template {} not found", id)));
        }

        Ok(())
    }

    async fn create_submission(&self, submission: &FormSubmission) -> Result<FormSubmission> {
        sqlx::query(
            r#"
            INSERT INTO form_submissions (id, template_id, data, metadata, created_at, updated_at, created_by_id, updated_by_id)
            VALUES (?, ?, ?, ?, NOW(), NOW(), ?, ?)
            "#,
        )
        .bind(submission.id)
        .bind(submission.template_id)
        .bind(sqlx::types::Json(&submission.data))
        .bind(sqlx::types::Json(&submission.metadata))
        .bind(submission.created_by_id)
        .bind(submission.updated_by_id)
        .execute(&self.pool)
        .await?;

        self.find_submission(submission.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create submission")))
    }

    async fn create_submission_with_request(
        &self,
        submission: &FormSubmission,
        request: &WorkRequest,
    ) -> Result<FormSubmission> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO form_submissions (id, template_id, data, metadata, created_at, updated_at, created_by_id, updated_by_id)
            VALUES (?, ?, ?, ?, NOW(), NOW(), ?, ?)
            "#,
        )
        .bind(submission.id)
        .bind(submission.template_id)
        .bind(sqlx::types::Json(&submission.data))
        .bind(sqlx::types::Json(&submission.metadata))
        .bind(submission.created_by_id)
        .bind(submission.updated_by_id)
        .execute(&mut *tx)
        .await?;

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
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_submission(submission.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create submission")))
    }

    async fn find_submission(&self, id: StringUuid) -> Result<Option<FormSubmission>> {
        let submission = sqlx::query_as::<_, FormSubmission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM form_submissions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(submission)
    }

    async fn list_submissions(
        &self,
        template_id: StringUuid,
        created_by: Option<StringUuid>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FormSubmission>> {
        let mut sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM form_submissions WHERE template_id = ?"
        );
        if created_by.is_some() {
            sql.push_str(" AND created_by_id = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, FormSubmission>(&sql).bind(template_id);
        if let Some(created_by) = created_by {
            query = query.bind(created_by);
        }
        let submissions = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        Ok(submissions)
    }

    async fn count_submissions(
        &self,
        template_id: StringUuid,
        created_by: Option<StringUuid>,
    ) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM form_submissions WHERE template_id = ?");
        if created_by.is_some() {
            sql.push_str(" AND created_by_id = ?");
        }

        let mut query = sqlx::query_as::<_, (i64,)>(&sql).bind(template_id);
        if let Some(created_by) = created_by {
            query = query.bind(created_by);
        }
        let row = query.fetch_one(&self.pool).await?;

        Ok(row.0)
    }

    async fn update_submission(&self, submission: &FormSubmission) -> Result<FormSubmission> {
        let result = sqlx::query(
            r#"
            UPDATE form_submissions
            SET data = ?, metadata = ?, updated_at = NOW(), updated_by_id = ?
            WHERE id = ?
            "#,
        )
        .bind(sqlx::types::Json(&submission.data))
        .bind(sqlx::types::Json(&submission.metadata))
        .bind(submission.updated_by_id)
        .bind(submission.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Submission {} not found",
                submission.id
            )));
        }

        self.find_submission(submission.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update submission")))
    }

    async fn delete_submission(
        &self,
        id: StringUuid,
        linked_request_id: Option<StringUuid>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(request_id) = linked_request_id {
            sqlx::query("DELETE FROM work_requests WHERE id = ?")
                .bind(request_id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM form_submissions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Submission {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_submissions_for_template(&self, template_id: StringUuid) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM form_submissions WHERE template_id = ?")
                .bind(template_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
