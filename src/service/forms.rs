//! Form template and submission business logic
//!
//! Templates may carry request settings. When enabled, each submission
//! materializes exactly one work request, written atomically with the
//! submission and cross-linked through both rows' metadata.

use crate::domain::{
    render_template, Account, CreateTemplateInput, FormSubmission, FormTemplate, RequestStatus,
    StringUuid, SubmitFormInput, UpdateTemplateInput, WorkRequest,
};
use crate::error::{AppError, Result};
use crate::policy::{actions, has_permission, require_permission};
use crate::repository::audit::CreateAuditLogInput;
use crate::repository::{AuditRepository, DepartmentRepository, FormRepository};
use crate::storage::AttachmentStore;
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

pub struct FormService<
    FR: FormRepository,
    DR: DepartmentRepository,
    AUR: AuditRepository,
    ST: AttachmentStore,
> {
    repo: Arc<FR>,
    department_repo: Arc<DR>,
    audit_repo: Arc<AUR>,
    attachments: Arc<ST>,
}

impl<FR: FormRepository, DR: DepartmentRepository, AUR: AuditRepository, ST: AttachmentStore>
    FormService<FR, DR, AUR, ST>
{
    pub fn new(
        repo: Arc<FR>,
        department_repo: Arc<DR>,
        audit_repo: Arc<AUR>,
        attachments: Arc<ST>,
    ) -> Self {
        Self {
            repo,
            department_repo,
            audit_repo,
            attachments,
        }
    }

    async fn audit(
        &self,
        actor: &Account,
        action: &str,
        resource_type: &str,
        resource_id: StringUuid,
        workspace_id: StringUuid,
    ) {
        let entry = CreateAuditLogInput {
            actor_id: Some(actor.id),
            workspace_id: Some(workspace_id),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: Some(resource_id),
            detail: None,
        };
        if let Err(err) = self.audit_repo.create(&entry).await {
            warn!(error = %err, action, "failed to write audit entry");
        }
    }

    async fn check_settings_department(
        &self,
        workspace_id: StringUuid,
        template: &FormTemplate,
    ) -> Result<()> {
        let Some(settings) = template.request_settings() else {
            return Ok(());
        };
        if !settings.enabled {
            return Ok(());
        }
        // A static target department must exist up front. A field-sourced
        // department is validated per submission.
        if settings.department_id.is_none() && settings.department_field_key.is_none() {
            return Err(AppError::Validation(
                "Request settings need a department or a department field".to_string(),
            ));
        }
        if let Some(department_id) = settings.department_id {
            self.department_repo
                .find_by_id(department_id)
                .await?
                .filter(|d| d.workspace_id == workspace_id)
                .ok_or_else(|| {
                    AppError::Validation(format!("Department {} does not exist", department_id))
                })?;
        }
        Ok(())
    }

    // ---- Templates ----

    pub async fn create_template(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        input: CreateTemplateInput,
    ) -> Result<FormTemplate> {
        require_permission(actor, actions::CREATE_FORM_TEMPLATE)?;
        input.validate()?;

        let mut template = FormTemplate {
            name: input.name,
            fields: input.fields,
            workspace_id,
            created_by_id: Some(actor.id),
            updated_by_id: Some(actor.id),
            ..Default::default()
        };
        if let Some(settings) = &input.request_settings {
            template.set_request_settings(settings);
        }
        self.check_settings_department(workspace_id, &template)
            .await?;

        let template = self.repo.create_template(&template).await?;
        self.audit(actor, "form_template.created", "form_template", template.id, workspace_id)
            .await;
        Ok(template)
    }

    pub async fn get_template(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<FormTemplate> {
        require_permission(actor, actions::VIEW_FORM_TEMPLATES)?;
        self.repo
            .find_template(id)
            .await?
            .filter(|t| t.workspace_id == workspace_id)
            .ok_or_else(|| AppError::NotFound(format!("Form template {} not found", id)))
    }

    pub async fn list_templates(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FormTemplate>, i64)> {
        require_permission(actor, actions::VIEW_FORM_TEMPLATES)?;
        let templates = self.repo.list_templates(workspace_id, offset, limit).await?;
        let total = self.repo.count_templates(workspace_id).await?;
        Ok((templates, total))
    }

    pub async fn update_template(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
        input: UpdateTemplateInput,
    ) -> Result<FormTemplate> {
        require_permission(actor, actions::EDIT_FORM_TEMPLATE)?;
        input.validate()?;

        let mut template = self.get_template(actor, workspace_id, id).await?;
        if let Some(name) = input.name {
            template.name = name;
        }
        if let Some(fields) = input.fields {
            template.fields = fields;
        }
        if let Some(settings) = &input.request_settings {
            template.set_request_settings(settings);
        }
        template.updated_by_id = Some(actor.id);
        self.check_settings_department(workspace_id, &template)
            .await?;

        let template = self.repo.update_template(&template).await?;
        self.audit(actor, "form_template.updated", "form_template", id, workspace_id)
            .await;
        Ok(template)
    }

    pub async fn delete_template(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<()> {
        require_permission(actor, actions::DELETE_FORM_TEMPLATE)?;
        self.get_template(actor, workspace_id, id).await?;

        let submissions = self.repo.count_submissions_for_template(id).await?;
        if submissions > 0 {
            return Err(AppError::Conflict(format!(
                "Template has {} submissions",
                submissions
            )));
        }

        self.repo.delete_template(id).await?;
        self.audit(actor, "form_template.deleted", "form_template", id, workspace_id)
            .await;
        Ok(())
    }

    // ---- Submissions ----

    /// Validate and store a submission. When the template's request settings
    /// are enabled, the materialized request is created in the same
    /// transaction and the two rows reference each other.
    pub async fn submit(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        template_id: StringUuid,
        input: SubmitFormInput,
    ) -> Result<FormSubmission> {
        require_permission(actor, actions::SUBMIT_FORM)?;
        let template = self.get_template(actor, workspace_id, template_id).await?;
        template.validate_data(&input.data)?;

        let mut submission = FormSubmission {
            template_id,
            data: input.data,
            created_by_id: Some(actor.id),
            updated_by_id: Some(actor.id),
            ..Default::default()
        };

        let settings = template.request_settings().filter(|s| s.enabled);
        if settings.is_some() {
            // Bridged templates materialize a request, so the caller also
            // needs the request-creation right.
            require_permission(actor, actions::CREATE_REQUEST)?;
        }
        let Some(settings) = settings else {
            let submission = self.repo.create_submission(&submission).await?;
            self.audit(actor, "form.submitted", "form_submission", submission.id, workspace_id)
                .await;
            return Ok(submission);
        };

        // A field-sourced department overrides the static target.
        let department_id = settings
            .department_field_key
            .as_deref()
            .and_then(|key| submission.data.get(key))
            .and_then(|v| v.as_str())
            .map(StringUuid::parse_str)
            .transpose()
            .map_err(|_| AppError::Validation("Invalid department field value".to_string()))?
            .or(settings.department_id)
            .ok_or_else(|| {
                AppError::Validation("Submission does not resolve to a department".to_string())
            })?;
        self.department_repo
            .find_by_id(department_id)
            .await?
            .filter(|d| d.workspace_id == workspace_id)
            .ok_or_else(|| {
                AppError::Validation(format!("Department {} does not exist", department_id))
            })?;

        let title = settings
            .title_template
            .as_deref()
            .map(|t| render_template(t, &submission.data))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| template.name.clone());
        let description = settings
            .description_template
            .as_deref()
            .map(|t| render_template(t, &submission.data))
            .unwrap_or_else(|| template.default_description(&submission.data));

        let mut request = WorkRequest {
            title,
            description: Some(description),
            status: RequestStatus::New,
            priority: settings.priority,
            department_id,
            creator_id: Some(actor.id),
            workspace_id,
            created_by_id: Some(actor.id),
            updated_by_id: Some(actor.id),
            ..Default::default()
        };
        request.link_record(template_id, submission.id);
        submission.link_request(request.id);

        let submission = self
            .repo
            .create_submission_with_request(&submission, &request)
            .await?;
        self.audit(actor, "form.submitted", "form_submission", submission.id, workspace_id)
            .await;
        Ok(submission)
    }

    fn submission_visibility(actor: &Account) -> Result<Option<StringUuid>> {
        if has_permission(actor.role, actions::VIEW_SUBMISSIONS) {
            Ok(None)
        } else if has_permission(actor.role, actions::VIEW_OWN_SUBMISSIONS) {
            Ok(Some(actor.id))
        } else {
            Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ))
        }
    }

    pub async fn get_submission(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<FormSubmission> {
        let only_own = Self::submission_visibility(actor)?;
        let submission = self
            .repo
            .find_submission(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submission {} not found", id)))?;
        // Submissions hang off a template, which carries the workspace.
        self.get_template(actor, workspace_id, submission.template_id)
            .await
            .map_err(|_| AppError::NotFound(format!("Submission {} not found", id)))?;
        if only_own.is_some() && submission.created_by_id != only_own {
            return Err(AppError::NotFound(format!("Submission {} not found", id)));
        }
        Ok(submission)
    }

    pub async fn list_submissions(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        template_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FormSubmission>, i64)> {
        let only_own = Self::submission_visibility(actor)?;
        self.get_template(actor, workspace_id, template_id).await?;

        let submissions = self
            .repo
            .list_submissions(template_id, only_own, offset, limit)
            .await?;
        let total = self.repo.count_submissions(template_id, only_own).await?;
        Ok((submissions, total))
    }

    pub async fn delete_submission(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<()> {
        require_permission(actor, actions::DELETE_SUBMISSION)?;
        let submission = self
            .repo
            .find_submission(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submission {} not found", id)))?;
        self.get_template(actor, workspace_id, submission.template_id)
            .await
            .map_err(|_| AppError::NotFound(format!("Submission {} not found", id)))?;

        self.repo
            .delete_submission(id, submission.linked_request_id())
            .await?;
        if let Err(err) = self.attachments.delete_for_entity(id).await {
            warn!(error = %err, submission_id = %id, "failed to delete submission attachments");
        }
        self.audit(actor, "form_submission.deleted", "form_submission", id, workspace_id)
            .await;
        Ok(())
    }
}
