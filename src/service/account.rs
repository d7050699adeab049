//! Account management business logic

use crate::domain::{
    Account, ChangeRoleInput, CreateAccountInput, Role, StringUuid, UpdateAccountInput,
};
use crate::error::{AppError, Result};
use crate::policy::{actions, require_permission};
use crate::repository::audit::CreateAuditLogInput;
use crate::repository::{AccountRepository, AuditRepository, DepartmentRepository};
use crate::service::auth::hash_password;
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

pub struct AccountService<AR: AccountRepository, DR: DepartmentRepository, AUR: AuditRepository> {
    repo: Arc<AR>,
    department_repo: Arc<DR>,
    audit_repo: Arc<AUR>,
}

/// Highest role an actor may hand out.
fn creation_ceiling(actor: &Account) -> Role {
    match actor.role {
        Role::Operator => Role::Operator,
        Role::WorkspaceAdmin => Role::Manager,
        Role::Manager => Role::User,
        Role::User | Role::Viewer => Role::Viewer,
    }
}

impl<AR: AccountRepository, DR: DepartmentRepository, AUR: AuditRepository>
    AccountService<AR, DR, AUR>
{
    pub fn new(repo: Arc<AR>, department_repo: Arc<DR>, audit_repo: Arc<AUR>) -> Self {
        Self {
            repo,
            department_repo,
            audit_repo,
        }
    }

    async fn audit(&self, actor: &Account, action: &str, resource_id: StringUuid) {
        let entry = CreateAuditLogInput {
            actor_id: Some(actor.id),
            workspace_id: actor.workspace_id,
            action: action.to_string(),
            resource_type: "account".to_string(),
            resource_id: Some(resource_id),
            detail: None,
        };
        if let Err(err) = self.audit_repo.create(&entry).await {
            warn!(error = %err, action, "failed to write audit entry");
        }
    }

    async fn check_department(
        &self,
        workspace_id: StringUuid,
        department_id: StringUuid,
    ) -> Result<()> {
        let department = self
            .department_repo
            .find_by_id(department_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("Department {} does not exist", department_id))
            })?;
        if department.workspace_id != workspace_id {
            return Err(AppError::Validation(format!(
                "Department {} does not exist",
                department_id
            )));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        mut input: CreateAccountInput,
    ) -> Result<Account> {
        require_permission(actor, actions::CREATE_ACCOUNT)?;
        input.validate()?;

        if input.role > creation_ceiling(actor) {
            return Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ));
        }

        if input.role.requires_workspace() {
            input.workspace_id = Some(workspace_id);
        }
        if input.role.requires_department() && input.department_id.is_none() {
            return Err(AppError::Validation(format!(
                "Role {} requires a department",
                input.role
            )));
        }
        if let Some(department_id) = input.department_id {
            self.check_department(workspace_id, department_id).await?;
            // Managers staff their own department only.
            if actor.role == Role::Manager && actor.department_id != Some(department_id) {
                return Err(AppError::PermissionDenied(
                    "insufficient privileges".to_string(),
                ));
            }
        }

        if self.repo.find_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Account with email '{}' already exists",
                input.email
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let account = self
            .repo
            .create(&input, &password_hash, Some(actor.id))
            .await?;
        self.audit(actor, "account.created", account.id).await;
        Ok(account)
    }

    /// Cross-workspace lookups read as missing.
    pub async fn get(&self, actor: &Account, id: StringUuid) -> Result<Account> {
        let account = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))?;
        if !actor.role.is_operator() && account.workspace_id != actor.workspace_id {
            return Err(AppError::NotFound(format!("Account {} not found", id)));
        }
        Ok(account)
    }

    pub async fn list(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        department_id: Option<StringUuid>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Account>, i64)> {
        match actor.role {
            Role::Operator | Role::WorkspaceAdmin => {
                require_permission(actor, actions::VIEW_ALL_ACCOUNTS)?;
            }
            _ => {
                // Below admin only department membership is listable.
                require_permission(actor, actions::VIEW_DEPARTMENT_MEMBERS)?;
                if department_id.is_none() {
                    return Err(AppError::PermissionDenied(
                        "insufficient privileges".to_string(),
                    ));
                }
            }
        }

        let accounts = self
            .repo
            .list(workspace_id, department_id, offset, limit)
            .await?;
        let total = self.repo.count(workspace_id, department_id).await?;
        Ok((accounts, total))
    }

    pub async fn update(
        &self,
        actor: &Account,
        id: StringUuid,
        input: UpdateAccountInput,
    ) -> Result<Account> {
        input.validate()?;
        let target = self.get(actor, id).await?;

        let self_update = actor.id == target.id;
        if !self_update {
            require_permission(actor, actions::EDIT_ACCOUNT)?;
            // Only strictly lower-ranked accounts may be edited.
            if target.role >= actor.role {
                return Err(AppError::PermissionDenied(
                    "insufficient privileges".to_string(),
                ));
            }
        } else if input.department_id.is_some() || input.is_active.is_some() {
            require_permission(actor, actions::EDIT_ACCOUNT)?;
        }

        if let Some(email) = input.email.as_deref() {
            if email != target.email && self.repo.find_by_email(email).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "Account with email '{}' already exists",
                    email
                )));
            }
        }
        if let Some(Some(department_id)) = input.department_id {
            let workspace_id = target.workspace_id.ok_or_else(|| {
                AppError::Validation("Account has no workspace".to_string())
            })?;
            self.check_department(workspace_id, department_id).await?;
        }

        let account = self.repo.update(id, &input, actor.id).await?;
        self.audit(actor, "account.updated", id).await;
        Ok(account)
    }

    pub async fn change_role(
        &self,
        actor: &Account,
        id: StringUuid,
        input: ChangeRoleInput,
    ) -> Result<Account> {
        require_permission(actor, actions::MANAGE_ROLES)?;
        if actor.id == id {
            return Err(AppError::Validation(
                "Cannot change your own role".to_string(),
            ));
        }

        let target = self.get(actor, id).await?;
        if !actor.role.is_operator()
            && (target.role >= actor.role || input.new_role >= actor.role)
        {
            return Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ));
        }

        // The department requirement follows the new role.
        let department_id = input.department_id.or(target.department_id);
        if input.new_role.requires_department() && department_id.is_none() {
            return Err(AppError::Validation(format!(
                "Role {} requires a department",
                input.new_role
            )));
        }
        if let (Some(workspace_id), Some(department_id)) = (target.workspace_id, department_id) {
            self.check_department(workspace_id, department_id).await?;
        }

        let account = self
            .repo
            .set_role(id, input.new_role, department_id, actor.id)
            .await?;
        self.audit(actor, "account.role_changed", id).await;
        Ok(account)
    }

    /// Soft delete. The row stays for audit trails and foreign keys.
    pub async fn deactivate(&self, actor: &Account, id: StringUuid) -> Result<()> {
        require_permission(actor, actions::DELETE_ACCOUNT)?;
        if actor.id == id {
            return Err(AppError::Validation(
                "Cannot deactivate your own account".to_string(),
            ));
        }

        let target = self.get(actor, id).await?;
        if !actor.role.is_operator() && target.role >= actor.role {
            return Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ));
        }

        self.repo.set_active(id, false, actor.id).await?;
        self.audit(actor, "account.deactivated", id).await;
        Ok(())
    }

    pub async fn reactivate(&self, actor: &Account, id: StringUuid) -> Result<()> {
        require_permission(actor, actions::DELETE_ACCOUNT)?;
        let target = self.get(actor, id).await?;
        if !actor.role.is_operator() && target.role >= actor.role {
            return Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ));
        }

        self.repo.set_active(id, true, actor.id).await?;
        self.audit(actor, "account.reactivated", id).await;
        Ok(())
    }
}
