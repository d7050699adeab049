//! Workspace business logic

use crate::domain::{
    Account, CreateWorkspaceInput, StringUuid, UpdateWorkspaceInput, Workspace, WorkspaceStatus,
};
use crate::error::{AppError, Result};
use crate::policy::{actions, require_permission};
use crate::repository::audit::CreateAuditLogInput;
use crate::repository::{AuditRepository, NewWorkspaceAdmin, WorkspaceRepository};
use crate::service::auth::hash_password;
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

pub struct WorkspaceService<WR: WorkspaceRepository, AUR: AuditRepository> {
    repo: Arc<WR>,
    audit_repo: Arc<AUR>,
}

impl<WR: WorkspaceRepository, AUR: AuditRepository> WorkspaceService<WR, AUR> {
    pub fn new(repo: Arc<WR>, audit_repo: Arc<AUR>) -> Self {
        Self { repo, audit_repo }
    }

    async fn audit(
        &self,
        actor: &Account,
        action: &str,
        workspace_id: StringUuid,
        detail: Option<serde_json::Value>,
    ) {
        let entry = CreateAuditLogInput {
            actor_id: Some(actor.id),
            workspace_id: Some(workspace_id),
            action: action.to_string(),
            resource_type: "workspace".to_string(),
            resource_id: Some(workspace_id),
            detail,
        };
        if let Err(err) = self.audit_repo.create(&entry).await {
            warn!(error = %err, action, "failed to write audit entry");
        }
    }

    /// Create a workspace together with its first admin account.
    pub async fn create(
        &self,
        actor: &Account,
        input: CreateWorkspaceInput,
    ) -> Result<(Workspace, Account)> {
        require_permission(actor, actions::CREATE_WORKSPACE)?;
        input.validate()?;

        if self.repo.find_by_slug(&input.slug).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Workspace with slug '{}' already exists",
                input.slug
            )));
        }

        let admin = NewWorkspaceAdmin {
            email: input.admin_email.clone(),
            full_name: input.admin_full_name.clone(),
            password_hash: hash_password(&input.admin_password)?,
        };
        let (workspace, account) = self
            .repo
            .create(&input.name, &input.slug, &admin, Some(actor.id))
            .await?;

        self.audit(
            actor,
            "workspace.created",
            workspace.id,
            Some(serde_json::json!({ "slug": workspace.slug })),
        )
        .await;

        Ok((workspace, account))
    }

    /// Operators see any workspace; everyone else only their own. A foreign
    /// workspace id reads as missing rather than forbidden.
    pub async fn get(&self, actor: &Account, id: StringUuid) -> Result<Workspace> {
        if !actor.role.is_operator() && actor.workspace_id != Some(id) {
            return Err(AppError::NotFound(format!("Workspace {} not found", id)));
        }
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workspace {} not found", id)))
    }

    pub async fn list(
        &self,
        actor: &Account,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Workspace>, i64)> {
        require_permission(actor, actions::VIEW_WORKSPACE_STATS)?;
        let workspaces = self.repo.list(offset, limit).await?;
        let total = self.repo.count().await?;
        Ok((workspaces, total))
    }

    pub async fn update(
        &self,
        actor: &Account,
        id: StringUuid,
        input: UpdateWorkspaceInput,
    ) -> Result<Workspace> {
        require_permission(actor, actions::EDIT_WORKSPACE)?;
        input.validate()?;

        let existing = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workspace {} not found", id)))?;
        if existing.status == WorkspaceStatus::Archived {
            return Err(AppError::Conflict(
                "Archived workspaces cannot be modified".to_string(),
            ));
        }

        let workspace = self.repo.update(id, &input, actor.id).await?;
        self.audit(actor, "workspace.updated", id, None).await;
        Ok(workspace)
    }

    pub async fn suspend(&self, actor: &Account, id: StringUuid) -> Result<Workspace> {
        self.set_status(actor, id, WorkspaceStatus::Suspended, "workspace.suspended")
            .await
    }

    pub async fn resume(&self, actor: &Account, id: StringUuid) -> Result<Workspace> {
        self.set_status(actor, id, WorkspaceStatus::Active, "workspace.resumed")
            .await
    }

    pub async fn archive(&self, actor: &Account, id: StringUuid) -> Result<Workspace> {
        self.set_status(actor, id, WorkspaceStatus::Archived, "workspace.archived")
            .await
    }

    async fn set_status(
        &self,
        actor: &Account,
        id: StringUuid,
        status: WorkspaceStatus,
        action: &str,
    ) -> Result<Workspace> {
        require_permission(actor, actions::SUSPEND_WORKSPACE)?;

        let existing = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workspace {} not found", id)))?;
        // Archived is terminal.
        if existing.status == WorkspaceStatus::Archived {
            return Err(AppError::Conflict(
                "Archived workspaces cannot change status".to_string(),
            ));
        }
        if existing.status == status {
            return Ok(existing);
        }

        let workspace = self.repo.set_status(id, status, actor.id).await?;
        self.audit(actor, action, id, None).await;
        Ok(workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::repository::audit::MockAuditRepository;
    use crate::repository::workspace::MockWorkspaceRepository;
    use mockall::predicate::*;

    fn operator() -> Account {
        Account {
            role: Role::Operator,
            ..Default::default()
        }
    }

    fn silent_audit() -> MockAuditRepository {
        let mut audit = MockAuditRepository::new();
        audit.expect_create().returning(|_| Ok(()));
        audit
    }

    fn input() -> CreateWorkspaceInput {
        CreateWorkspaceInput {
            name: "Acme".to_string(),
            slug: "acme".to_string(),
            admin_email: "admin@acme.example".to_string(),
            admin_full_name: "Acme Admin".to_string(),
            admin_password: "correct-horse-battery".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_workspace_with_admin() {
        let mut repo = MockWorkspaceRepository::new();
        repo.expect_find_by_slug()
            .with(eq("acme"))
            .returning(|_| Ok(None));
        repo.expect_create().returning(|name, slug, admin, _| {
            Ok((
                Workspace {
                    name: name.to_string(),
                    slug: slug.to_string(),
                    ..Default::default()
                },
                Account {
                    email: admin.email.clone(),
                    full_name: admin.full_name.clone(),
                    role: Role::WorkspaceAdmin,
                    ..Default::default()
                },
            ))
        });

        let service = WorkspaceService::new(Arc::new(repo), Arc::new(silent_audit()));
        let (workspace, admin) = service.create(&operator(), input()).await.unwrap();
        assert_eq!(workspace.slug, "acme");
        assert_eq!(admin.role, Role::WorkspaceAdmin);
    }

    #[tokio::test]
    async fn test_create_duplicate_slug_conflict() {
        let mut repo = MockWorkspaceRepository::new();
        repo.expect_find_by_slug()
            .returning(|_| Ok(Some(Workspace::default())));

        let service = WorkspaceService::new(Arc::new(repo), Arc::new(MockAuditRepository::new()));
        let err = service.create(&operator(), input()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_requires_operator() {
        let admin = Account {
            role: Role::WorkspaceAdmin,
            ..Default::default()
        };
        let service = WorkspaceService::new(
            Arc::new(MockWorkspaceRepository::new()),
            Arc::new(MockAuditRepository::new()),
        );
        let err = service.create(&admin, input()).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_get_foreign_workspace_reads_as_missing() {
        let member = Account {
            role: Role::User,
            workspace_id: Some(StringUuid::new_v4()),
            ..Default::default()
        };
        let service = WorkspaceService::new(
            Arc::new(MockWorkspaceRepository::new()),
            Arc::new(MockAuditRepository::new()),
        );
        let err = service
            .get(&member, StringUuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_suspend_and_archived_terminal() {
        let id = StringUuid::new_v4();
        let mut repo = MockWorkspaceRepository::new();
        repo.expect_find_by_id().with(eq(id)).returning(move |id| {
            Ok(Some(Workspace {
                id,
                status: WorkspaceStatus::Archived,
                is_active: false,
                ..Default::default()
            }))
        });

        let service = WorkspaceService::new(Arc::new(repo), Arc::new(MockAuditRepository::new()));
        let err = service.resume(&operator(), id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_suspend_same_status_noop() {
        let id = StringUuid::new_v4();
        let mut repo = MockWorkspaceRepository::new();
        repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Workspace {
                id,
                status: WorkspaceStatus::Suspended,
                is_active: false,
                ..Default::default()
            }))
        });

        let service = WorkspaceService::new(Arc::new(repo), Arc::new(MockAuditRepository::new()));
        let workspace = service.suspend(&operator(), id).await.unwrap();
        assert_eq!(workspace.status, WorkspaceStatus::Suspended);
    }
}
