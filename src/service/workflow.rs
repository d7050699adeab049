//! Department registry and request lifecycle business logic

use crate::config::WorkflowConfig;
use crate::domain::{
    Account, CreateDepartmentInput, CreateRequestInput, Department, Rank, RankInput, RequestFilter,
    RequestStatus, Role, StringUuid, UpdateDepartmentInput, UpdateRequestInput, WorkRequest,
};
use crate::error::{AppError, Result};
use crate::policy::{actions, require_department_match, require_permission, scope_filter};
use crate::repository::audit::CreateAuditLogInput;
use crate::repository::{AccountRepository, AuditRepository, DepartmentRepository, RequestRepository};
use crate::storage::AttachmentStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

pub struct WorkflowService<
    DR: DepartmentRepository,
    RR: RequestRepository,
    AR: AccountRepository,
    AUR: AuditRepository,
    ST: AttachmentStore,
> {
    department_repo: Arc<DR>,
    request_repo: Arc<RR>,
    account_repo: Arc<AR>,
    audit_repo: Arc<AUR>,
    attachments: Arc<ST>,
    config: WorkflowConfig,
}

impl<
        DR: DepartmentRepository,
        RR: RequestRepository,
        AR: AccountRepository,
        AUR: AuditRepository,
        ST: AttachmentStore,
    > WorkflowService<DR, RR, AR, AUR, ST>
{
    pub fn new(
        department_repo: Arc<DR>,
        request_repo: Arc<RR>,
        account_repo: Arc<AR>,
        audit_repo: Arc<AUR>,
        attachments: Arc<ST>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            department_repo,
            request_repo,
            account_repo,
            audit_repo,
            attachments,
            config,
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

    // ---- Departments ----

    pub async fn create_department(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        input: CreateDepartmentInput,
    ) -> Result<Department> {
        require_permission(actor, actions::CREATE_DEPARTMENT)?;
        input.validate()?;

        let department = self
            .department_repo
            .create(workspace_id, &input, actor.id)
            .await?;
        self.audit(actor, "department.created", "department", department.id, workspace_id)
            .await;
        Ok(department)
    }

    pub async fn get_department(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<Department> {
        require_permission(actor, actions::VIEW_DEPARTMENTS)?;
        let department = self
            .department_repo
            .find_by_id(id)
            .await?
            .filter(|d| d.workspace_id == workspace_id)
            .ok_or_else(|| AppError::NotFound(format!("Department {} not found", id)))?;
        Ok(department)
    }

    pub async fn list_departments(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Department>, i64)> {
        require_permission(actor, actions::VIEW_DEPARTMENTS)?;
        let departments = self.department_repo.list(workspace_id, offset, limit).await?;
        let total = self.department_repo.count(workspace_id).await?;
        Ok((departments, total))
    }

    pub async fn update_department(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
        input: UpdateDepartmentInput,
    ) -> Result<Department> {
        require_permission(actor, actions::EDIT_DEPARTMENT)?;
        input.validate()?;
        self.get_department(actor, workspace_id, id).await?;

        let department = self.department_repo.update(id, &input, actor.id).await?;
        self.audit(actor, "department.updated", "department", id, workspace_id)
            .await;
        Ok(department)
    }

    /// Deleting a department with members or live requests would strand
    /// them, so both block the delete.
    pub async fn delete_department(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<()> {
        require_permission(actor, actions::DELETE_DEPARTMENT)?;
        self.get_department(actor, workspace_id, id).await?;

        let live_requests = self.request_repo.count_live_by_department(id).await?;
        if live_requests > 0 {
            return Err(AppError::Conflict(format!(
                "Department has {} open requests",
                live_requests
            )));
        }
        let members = self.account_repo.count_by_department(id).await?;
        if members > 0 {
            return Err(AppError::Conflict(format!(
                "Department has {} members",
                members
            )));
        }

        self.department_repo.delete(id).await?;
        self.audit(actor, "department.deleted", "department", id, workspace_id)
            .await;
        Ok(())
    }

    // ---- Ranks ----

    async fn department_for_rank_change(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        department_id: StringUuid,
    ) -> Result<Department> {
        require_permission(actor, actions::MANAGE_DEPARTMENT_RANKS)?;
        let department = self
            .get_department(actor, workspace_id, department_id)
            .await?;
        require_department_match(actor, department_id)?;
        Ok(department)
    }

    pub async fn add_rank(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        department_id: StringUuid,
        input: RankInput,
    ) -> Result<Department> {
        input.validate()?;
        let mut department = self
            .department_for_rank_change(actor, workspace_id, department_id)
            .await?;
        department.add_rank(Rank {
            id: input.id,
            name: input.name,
            order: input.order,
        })?;

        let department = self
            .department_repo
            .set_metadata(department_id, &department.metadata, actor.id)
            .await?;
        self.audit(actor, "department.rank_added", "department", department_id, workspace_id)
            .await;
        Ok(department)
    }

    pub async fn update_rank(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        department_id: StringUuid,
        rank_id: &str,
        name: Option<String>,
        order: Option<i32>,
    ) -> Result<Department> {
        let mut department = self
            .department_for_rank_change(actor, workspace_id, department_id)
            .await?;
        department.update_rank(rank_id, name, order)?;

        let department = self
            .department_repo
            .set_metadata(department_id, &department.metadata, actor.id)
            .await?;
        self.audit(actor, "department.rank_updated", "department", department_id, workspace_id)
            .await;
        Ok(department)
    }

    pub async fn remove_rank(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        department_id: StringUuid,
        rank_id: &str,
    ) -> Result<Department> {
        let mut department = self
            .department_for_rank_change(actor, workspace_id, department_id)
            .await?;
        department.remove_rank(rank_id)?;

        let department = self
            .department_repo
            .set_metadata(department_id, &department.metadata, actor.id)
            .await?;
        self.audit(actor, "department.rank_removed", "department", department_id, workspace_id)
            .await;
        Ok(department)
    }

    /// Pin an account to one of its department's ranks, or clear it.
    pub async fn assign_account_rank(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        account_id: StringUuid,
        rank_id: Option<&str>,
    ) -> Result<Account> {
        require_permission(actor, actions::ASSIGN_ACCOUNT_RANK)?;

        let mut account = self
            .account_repo
            .find_by_id(account_id)
            .await?
            .filter(|a| a.workspace_id == Some(workspace_id))
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;
        let department_id = account.department_id.ok_or_else(|| {
            AppError::Validation("Account does not belong to a department".to_string())
        })?;
        require_department_match(actor, department_id)?;

        if let Some(rank_id) = rank_id {
            let department = self
                .get_department(actor, workspace_id, department_id)
                .await?;
            if department.find_rank(rank_id).is_none() {
                return Err(AppError::Validation(format!(
                    "Rank '{}' does not exist in department",
                    rank_id
                )));
            }
        }

        account.set_rank_id(rank_id);
        let account = self
            .account_repo
            .set_metadata(account_id, &account.metadata, actor.id)
            .await?;
        self.audit(actor, "account.rank_assigned", "account", account_id, workspace_id)
            .await;
        Ok(account)
    }

    // ---- Requests ----

    pub async fn create_request(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        input: CreateRequestInput,
    ) -> Result<WorkRequest> {
        require_permission(actor, actions::CREATE_REQUEST)?;
        input.validate()?;
        self.get_department(actor, workspace_id, input.department_id)
            .await
            .map_err(|_| {
                AppError::Validation(format!(
                    "Department {} does not exist",
                    input.department_id
                ))
            })?;

        let request = WorkRequest {
            title: input.title,
            description: input.description,
            status: RequestStatus::New,
            priority: input.priority,
            department_id: input.department_id,
            creator_id: Some(actor.id),
            workspace_id,
            created_by_id: Some(actor.id),
            updated_by_id: Some(actor.id),
            ..Default::default()
        };
        let request = self.request_repo.insert(&request).await?;
        self.audit(actor, "request.created", "request", request.id, workspace_id)
            .await;
        Ok(request)
    }

    /// Fetch a request the actor is allowed to see. Rows outside the
    /// actor's scope read as missing.
    pub async fn get_request(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<WorkRequest> {
        let request = self
            .request_repo
            .find_by_id(id)
            .await?
            .filter(|r| r.workspace_id == workspace_id)
            .filter(|r| scope_filter(actor).permits(r))
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?;
        Ok(request)
    }

    pub async fn list_requests(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        filter: RequestFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<WorkRequest>, i64)> {
        let scope = scope_filter(actor);
        let requests = self
            .request_repo
            .list(workspace_id, &scope, &filter, offset, limit)
            .await?;
        let total = self.request_repo.count(workspace_id, &scope, &filter).await?;
        Ok((requests, total))
    }

    /// Requests still in flight (everything not yet Done).
    pub async fn list_active(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        mut filter: RequestFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<WorkRequest>, i64)> {
        filter.done = Some(false);
        self.list_requests(actor, workspace_id, filter, offset, limit)
            .await
    }

    /// Completed requests.
    pub async fn list_history(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        mut filter: RequestFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<WorkRequest>, i64)> {
        filter.done = Some(true);
        self.list_requests(actor, workspace_id, filter, offset, limit)
            .await
    }

    fn can_edit(actor: &Account, request: &WorkRequest) -> bool {
        use crate::policy::has_permission;
        has_permission(actor.role, actions::EDIT_REQUEST)
            || (has_permission(actor.role, actions::EDIT_OWN_REQUEST)
                && Self::is_own(actor, request))
    }

    fn is_own(actor: &Account, request: &WorkRequest) -> bool {
        request.creator_id == Some(actor.id) || request.assignee_id == Some(actor.id)
    }

    /// Assignment lands in Assigned whatever the prior status.
    async fn force_assigned(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        mut request: WorkRequest,
    ) -> Result<WorkRequest> {
        if request.status == RequestStatus::Assigned {
            return Ok(request);
        }
        if request.status == RequestStatus::Done {
            request.clear_done_at();
        }
        request.status = RequestStatus::Assigned;
        let request = self.request_repo.update_fields(&request, actor.id).await?;
        self.audit(
            actor,
            "request.assigned",
            "request",
            request.id,
            workspace_id,
        )
        .await;
        Ok(request)
    }

    pub async fn update_request(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
        input: UpdateRequestInput,
    ) -> Result<WorkRequest> {
        input.validate()?;
        let mut request = self.get_request(actor, workspace_id, id).await?;
        if !Self::can_edit(actor, &request) {
            return Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ));
        }

        if let Some(department_id) = input.department_id {
            self.get_department(actor, workspace_id, department_id)
                .await
                .map_err(|_| {
                    AppError::Validation(format!("Department {} does not exist", department_id))
                })?;
            request.department_id = department_id;
        }
        if let Some(title) = input.title {
            request.title = title;
        }
        if let Some(description) = input.description {
            request.description = Some(description);
        }
        if let Some(priority) = input.priority {
            request.priority = priority;
        }

        let request = self.request_repo.update_fields(&request, actor.id).await?;
        self.audit(actor, "request.updated", "request", id, workspace_id)
            .await;
        Ok(request)
    }

    /// Assignment always lands the request in Assigned, whatever its
    /// previous state. A request that already has an assignee is not
    /// silently reassigned.
    pub async fn assign_request(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
        assignee_id: StringUuid,
    ) -> Result<WorkRequest> {
        require_permission(actor, actions::ASSIGN_REQUEST)?;
        let request = self.get_request(actor, workspace_id, id).await?;
        if actor.role == Role::Manager {
            require_department_match(actor, request.department_id)?;
        }

        let assignee = self
            .account_repo
            .find_by_id(assignee_id)
            .await?
            .filter(|a| a.workspace_id == Some(workspace_id))
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", assignee_id)))?;
        if !assignee.is_active {
            return Err(AppError::Validation(
                "Assignee account is disabled".to_string(),
            ));
        }
        // Managers hand work to Users in their own department, nothing else.
        if actor.role == Role::Manager
            && (assignee.role != Role::User
                || assignee.department_id != Some(request.department_id))
        {
            return Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ));
        }
        // Re-assigning the current assignee succeeds without touching the
        // CAS guard, but the status is still forced to Assigned.
        if request.assignee_id == Some(assignee_id) {
            return self.force_assigned(actor, workspace_id, request).await;
        }
        if !self
            .request_repo
            .try_assign(id, assignee_id, actor.id)
            .await?
        {
            return Err(AppError::AlreadyAssigned);
        }

        self.audit(actor, "request.assigned", "request", id, workspace_id)
            .await;
        self.get_request(actor, workspace_id, id).await
    }

    /// Unassignment always resets the request to New.
    pub async fn unassign_request(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<WorkRequest> {
        require_permission(actor, actions::ASSIGN_REQUEST)?;
        let request = self.get_request(actor, workspace_id, id).await?;
        if actor.role == Role::Manager {
            require_department_match(actor, request.department_id)?;
        }

        self.request_repo.unassign(id, actor.id).await?;
        self.audit(actor, "request.unassigned", "request", id, workspace_id)
            .await;
        self.get_request(actor, workspace_id, id).await
    }

    pub async fn set_request_status(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
        target: RequestStatus,
    ) -> Result<WorkRequest> {
        let mut request = self.get_request(actor, workspace_id, id).await?;
        if !Self::can_edit(actor, &request) {
            return Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ));
        }
        // A Manager's creator/assignee rows outside the department are
        // visible but not status-editable.
        if actor.role == Role::Manager {
            require_department_match(actor, request.department_id)?;
        }

        if target == request.status {
            return Ok(request);
        }
        if self.config.strict_transitions && !request.status.can_transition_to(target) {
            return Err(AppError::InvalidStatus(format!(
                "{} -> {}",
                request.status, target
            )));
        }
        // Assignment travels through the assign endpoint so the CAS guard
        // applies; a bare status flip cannot conjure an assignee.
        if target == RequestStatus::Assigned && request.assignee_id.is_none() {
            return Err(AppError::InvalidStatus(
                "cannot enter assigned without an assignee".to_string(),
            ));
        }

        let was_done = request.status == RequestStatus::Done;
        request.status = target;
        if target == RequestStatus::Done {
            request.stamp_done_at(Utc::now());
        } else if was_done {
            request.clear_done_at();
        }

        let request = self.request_repo.update_fields(&request, actor.id).await?;
        self.audit(actor, "request.status_changed", "request", id, workspace_id)
            .await;
        Ok(request)
    }

    pub async fn delete_request(
        &self,
        actor: &Account,
        workspace_id: StringUuid,
        id: StringUuid,
    ) -> Result<()> {
        use crate::policy::has_permission;
        let request = self.get_request(actor, workspace_id, id).await?;

        let allowed = has_permission(actor.role, actions::DELETE_REQUEST)
            || (has_permission(actor.role, actions::DELETE_OWN_REQUEST)
                && Self::is_own(actor, &request));
        if !allowed {
            return Err(AppError::PermissionDenied(
                "insufficient privileges".to_string(),
            ));
        }

        self.request_repo
            .delete(id, request.linked_record_id())
            .await?;
        if let Err(err) = self.attachments.delete_for_entity(id).await {
            warn!(error = %err, request_id = %id, "failed to delete request attachments");
        }
        self.audit(actor, "request.deleted", "request", id, workspace_id)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RowScope;
    use crate::repository::account::MockAccountRepository;
    use crate::repository::audit::MockAuditRepository;
    use crate::repository::department::MockDepartmentRepository;
    use crate::repository::request::MockRequestRepository;
    use crate::storage::MockAttachmentStore;
    use mockall::predicate::*;

    type TestService = WorkflowService<
        MockDepartmentRepository,
        MockRequestRepository,
        MockAccountRepository,
        MockAuditRepository,
        MockAttachmentStore,
    >;

    struct Mocks {
        department_repo: MockDepartmentRepository,
        request_repo: MockRequestRepository,
        account_repo: MockAccountRepository,
        attachments: MockAttachmentStore,
        config: WorkflowConfig,
    }

    impl Default for Mocks {
        fn default() -> Self {
            Self {
                department_repo: MockDepartmentRepository::new(),
                request_repo: MockRequestRepository::new(),
                account_repo: MockAccountRepository::new(),
                attachments: MockAttachmentStore::new(),
                config: WorkflowConfig {
                    strict_transitions: true,
                },
            }
        }
    }

    impl Mocks {
        fn build(self) -> TestService {
            let mut audit = MockAuditRepository::new();
            audit.expect_create().returning(|_| Ok(()));
            WorkflowService::new(
                Arc::new(self.department_repo),
                Arc::new(self.request_repo),
                Arc::new(self.account_repo),
                Arc::new(audit),
                Arc::new(self.attachments),
                self.config,
            )
        }
    }

    fn admin(workspace_id: StringUuid) -> Account {
        Account {
            role: Role::WorkspaceAdmin,
            workspace_id: Some(workspace_id),
            ..Default::default()
        }
    }

    fn request_in(workspace_id: StringUuid, status: RequestStatus) -> WorkRequest {
        WorkRequest {
            status,
            workspace_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_request_starts_new() {
        let workspace_id = StringUuid::new_v4();
        let department_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks
            .department_repo
            .expect_find_by_id()
            .with(eq(department_id))
            .returning(move |id| {
                Ok(Some(Department {
                    id,
                    workspace_id,
                    ..Default::default()
                }))
            });
        mocks
            .request_repo
            .expect_insert()
            .withf(move |r| r.status == RequestStatus::New && r.department_id == department_id)
            .returning(|r| Ok(r.clone()));

        let actor = admin(workspace_id);
        let request = mocks
            .build()
            .create_request(
                &actor,
                workspace_id,
                CreateRequestInput {
                    title: "Fix printer".to_string(),
                    description: None,
                    priority: Default::default(),
                    department_id,
                },
            )
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::New);
        assert_eq!(request.creator_id, Some(actor.id));
    }

    #[tokio::test]
    async fn test_get_request_out_of_scope_reads_as_missing() {
        let workspace_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                ..Default::default()
            }))
        });

        let outsider = Account {
            role: Role::User,
            workspace_id: Some(workspace_id),
            ..Default::default()
        };
        let err = mocks
            .build()
            .get_request(&outsider, workspace_id, StringUuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_assign_race_surfaces_conflict() {
        let workspace_id = StringUuid::new_v4();
        let assignee_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                ..Default::default()
            }))
        });
        mocks.account_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Account {
                id,
                workspace_id: Some(workspace_id),
                is_active: true,
                ..Default::default()
            }))
        });
        mocks
            .request_repo
            .expect_try_assign()
            .returning(|_, _, _| Ok(false));

        let err = mocks
            .build()
            .assign_request(&admin(workspace_id), workspace_id, StringUuid::new_v4(), assignee_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyAssigned));
    }

    #[tokio::test]
    async fn test_admin_assigns_across_departments() {
        // The same-department constraint binds Managers only.
        let workspace_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        let request_department = StringUuid::new_v4();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                department_id: request_department,
                ..Default::default()
            }))
        });
        mocks.account_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Account {
                id,
                workspace_id: Some(workspace_id),
                department_id: Some(StringUuid::new_v4()),
                is_active: true,
                ..Default::default()
            }))
        });
        mocks
            .request_repo
            .expect_try_assign()
            .times(1)
            .returning(|_, _, _| Ok(true));

        mocks
            .build()
            .assign_request(
                &admin(workspace_id),
                workspace_id,
                StringUuid::new_v4(),
                StringUuid::new_v4(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_manager_cannot_assign_to_non_user() {
        let workspace_id = StringUuid::new_v4();
        let department_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                department_id,
                ..Default::default()
            }))
        });
        mocks.account_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Account {
                id,
                role: Role::Manager,
                workspace_id: Some(workspace_id),
                department_id: Some(department_id),
                is_active: true,
                ..Default::default()
            }))
        });

        let manager = Account {
            role: Role::Manager,
            workspace_id: Some(workspace_id),
            department_id: Some(department_id),
            ..Default::default()
        };
        let err = mocks
            .build()
            .assign_request(&manager, workspace_id, StringUuid::new_v4(), StringUuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_reassign_same_assignee_is_noop() {
        let workspace_id = StringUuid::new_v4();
        let assignee_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                assignee_id: Some(assignee_id),
                status: RequestStatus::Assigned,
                ..Default::default()
            }))
        });
        mocks.account_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Account {
                id,
                workspace_id: Some(workspace_id),
                is_active: true,
                ..Default::default()
            }))
        });
        // No try_assign expectation: the CAS must not run.

        let request = mocks
            .build()
            .assign_request(&admin(workspace_id), workspace_id, StringUuid::new_v4(), assignee_id)
            .await
            .unwrap();
        assert_eq!(request.assignee_id, Some(assignee_id));
    }

    #[tokio::test]
    async fn test_reassign_current_assignee_forces_assigned() {
        let workspace_id = StringUuid::new_v4();
        let assignee_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                assignee_id: Some(assignee_id),
                status: RequestStatus::InProcess,
                ..Default::default()
            }))
        });
        mocks.account_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Account {
                id,
                workspace_id: Some(workspace_id),
                is_active: true,
                ..Default::default()
            }))
        });
        // The CAS must not run, but the status write must.
        mocks
            .request_repo
            .expect_update_fields()
            .withf(|r, _| r.status == RequestStatus::Assigned)
            .times(1)
            .returning(|r, _| Ok(r.clone()));

        let request = mocks
            .build()
            .assign_request(&admin(workspace_id), workspace_id, StringUuid::new_v4(), assignee_id)
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::Assigned);
        assert_eq!(request.assignee_id, Some(assignee_id));
    }

    #[tokio::test]
    async fn test_assign_twice_same_final_state() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let workspace_id = StringUuid::new_v4();
        let request_id = StringUuid::new_v4();
        let assignee_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        let calls = AtomicUsize::new(0);
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            // Unassigned on the first read, Assigned on every read after
            // the CAS lands.
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Some(WorkRequest {
                    id,
                    workspace_id,
                    status: RequestStatus::New,
                    ..Default::default()
                }))
            } else {
                Ok(Some(WorkRequest {
                    id,
                    workspace_id,
                    assignee_id: Some(assignee_id),
                    status: RequestStatus::Assigned,
                    ..Default::default()
                }))
            }
        });
        mocks.account_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Account {
                id,
                workspace_id: Some(workspace_id),
                is_active: true,
                ..Default::default()
            }))
        });
        mocks
            .request_repo
            .expect_try_assign()
            .times(1)
            .returning(|_, _, _| Ok(true));

        let service = mocks.build();
        let actor = admin(workspace_id);
        let first = service
            .assign_request(&actor, workspace_id, request_id, assignee_id)
            .await
            .unwrap();
        let second = service
            .assign_request(&actor, workspace_id, request_id, assignee_id)
            .await
            .unwrap();
        assert_eq!(first.status, RequestStatus::Assigned);
        assert_eq!(second.status, first.status);
        assert_eq!(second.assignee_id, first.assignee_id);
    }

    #[tokio::test]
    async fn test_unassign_resets_to_new() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let workspace_id = StringUuid::new_v4();
        let assignee_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        let calls = AtomicUsize::new(0);
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            // Assigned on the pre-check read, cleared on the refetch.
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Some(WorkRequest {
                    id,
                    workspace_id,
                    assignee_id: Some(assignee_id),
                    status: RequestStatus::Assigned,
                    ..Default::default()
                }))
            } else {
                Ok(Some(WorkRequest {
                    id,
                    workspace_id,
                    assignee_id: None,
                    status: RequestStatus::New,
                    ..Default::default()
                }))
            }
        });
        mocks
            .request_repo
            .expect_unassign()
            .times(1)
            .returning(|_, _| Ok(()));

        let request = mocks
            .build()
            .unassign_request(&admin(workspace_id), workspace_id, StringUuid::new_v4())
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::New);
        assert!(request.assignee_id.is_none());
    }

    #[tokio::test]
    async fn test_delete_request_detaches_linked_submission() {
        let workspace_id = StringUuid::new_v4();
        let submission_id = StringUuid::new_v4();
        let template_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            let mut request = WorkRequest {
                id,
                workspace_id,
                ..Default::default()
            };
            request.link_record(template_id, submission_id);
            Ok(Some(request))
        });
        mocks
            .request_repo
            .expect_delete()
            .withf(move |_, linked| *linked == Some(submission_id))
            .returning(|_, _| Ok(()));
        mocks
            .attachments
            .expect_delete_for_entity()
            .returning(|_| Ok(()));

        mocks
            .build()
            .delete_request(&admin(workspace_id), workspace_id, StringUuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_assignee_deletes_own_request() {
        // Own means created-by or assigned-to, on the delete path as on
        // the read path.
        let workspace_id = StringUuid::new_v4();
        let actor = Account {
            role: Role::User,
            workspace_id: Some(workspace_id),
            ..Default::default()
        };
        let actor_id = actor.id;
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                creator_id: Some(StringUuid::new_v4()),
                assignee_id: Some(actor_id),
                ..Default::default()
            }))
        });
        mocks
            .request_repo
            .expect_delete()
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .attachments
            .expect_delete_for_entity()
            .returning(|_| Ok(()));

        mocks
            .build()
            .delete_request(&actor, workspace_id, StringUuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_manager_status_update_outside_department_denied() {
        let workspace_id = StringUuid::new_v4();
        let manager = Account {
            role: Role::Manager,
            workspace_id: Some(workspace_id),
            department_id: Some(StringUuid::new_v4()),
            ..Default::default()
        };
        let manager_id = manager.id;
        let mut mocks = Mocks::default();
        // Visible to the manager as its creator, but homed in another
        // department.
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                department_id: StringUuid::new_v4(),
                creator_id: Some(manager_id),
                status: RequestStatus::Assigned,
                ..Default::default()
            }))
        });

        let err = mocks
            .build()
            .set_request_status(
                &manager,
                workspace_id,
                StringUuid::new_v4(),
                RequestStatus::InProcess,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_manager_active_listing_scoped_to_department() {
        let workspace_id = StringUuid::new_v4();
        let department_id = StringUuid::new_v4();
        let manager = Account {
            role: Role::Manager,
            workspace_id: Some(workspace_id),
            department_id: Some(department_id),
            ..Default::default()
        };
        let manager_id = manager.id;
        let scope_matches = move |scope: &RowScope| {
            *scope
                == RowScope::DepartmentOrOwn {
                    department_id: Some(department_id),
                    account_id: manager_id,
                }
        };
        let mut mocks = Mocks::default();
        mocks
            .request_repo
            .expect_list()
            .withf(move |_, scope, filter, _, _| {
                scope_matches(scope) && filter.done == Some(false)
            })
            .returning(|_, _, _, _, _| Ok(vec![]));
        mocks
            .request_repo
            .expect_count()
            .withf(move |_, scope, filter| scope_matches(scope) && filter.done == Some(false))
            .returning(|_, _, _| Ok(0));

        let (requests, total) = mocks
            .build()
            .list_active(
                &manager,
                workspace_id,
                RequestFilter::default(),
                0,
                20,
            )
            .await
            .unwrap();
        assert!(requests.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_strict_transition_rejected() {
        let workspace_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks
            .request_repo
            .expect_find_by_id()
            .returning(move |id| {
                Ok(Some(WorkRequest {
                    id,
                    ..request_in(workspace_id, RequestStatus::New)
                }))
            });

        let err = mocks
            .build()
            .set_request_status(
                &admin(workspace_id),
                workspace_id,
                StringUuid::new_v4(),
                RequestStatus::Done,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatus(_)));
    }

    #[tokio::test]
    async fn test_lenient_transition_allowed_when_configured() {
        let workspace_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.config.strict_transitions = false;
        mocks
            .request_repo
            .expect_find_by_id()
            .returning(move |id| {
                Ok(Some(WorkRequest {
                    id,
                    ..request_in(workspace_id, RequestStatus::New)
                }))
            });
        mocks
            .request_repo
            .expect_update_fields()
            .withf(|r, _| r.status == RequestStatus::Done && r.done_at().is_some())
            .returning(|r, _| Ok(r.clone()));

        let request = mocks
            .build()
            .set_request_status(
                &admin(workspace_id),
                workspace_id,
                StringUuid::new_v4(),
                RequestStatus::Done,
            )
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::Done);
    }

    #[tokio::test]
    async fn test_done_stamps_done_at() {
        let workspace_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks
            .request_repo
            .expect_find_by_id()
            .returning(move |id| {
                Ok(Some(WorkRequest {
                    id,
                    ..request_in(workspace_id, RequestStatus::Pending)
                }))
            });
        mocks
            .request_repo
            .expect_update_fields()
            .withf(|r, _| r.done_at().is_some())
            .returning(|r, _| Ok(r.clone()));

        mocks
            .build()
            .set_request_status(
                &admin(workspace_id),
                workspace_id,
                StringUuid::new_v4(),
                RequestStatus::Done,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_cannot_enter_assigned_without_assignee() {
        let workspace_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks
            .request_repo
            .expect_find_by_id()
            .returning(move |id| {
                Ok(Some(WorkRequest {
                    id,
                    ..request_in(workspace_id, RequestStatus::New)
                }))
            });

        let err = mocks
            .build()
            .set_request_status(
                &admin(workspace_id),
                workspace_id,
                StringUuid::new_v4(),
                RequestStatus::Assigned,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatus(_)));
    }

    #[tokio::test]
    async fn test_user_cannot_edit_foreign_visible_row() {
        let workspace_id = StringUuid::new_v4();
        let user = Account {
            role: Role::Viewer,
            workspace_id: Some(workspace_id),
            ..Default::default()
        };
        let user_id = user.id;
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                creator_id: Some(user_id),
                ..Default::default()
            }))
        });

        // Visible (own row) but viewers hold no edit grant at all.
        let err = mocks
            .build()
            .update_request(
                &user,
                workspace_id,
                StringUuid::new_v4(),
                UpdateRequestInput {
                    title: Some("new title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_delete_department_with_live_requests_conflicts() {
        let workspace_id = StringUuid::new_v4();
        let department_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks
            .department_repo
            .expect_find_by_id()
            .returning(move |id| {
                Ok(Some(Department {
                    id,
                    workspace_id,
                    ..Default::default()
                }))
            });
        mocks
            .request_repo
            .expect_count_live_by_department()
            .returning(|_| Ok(3));

        let err = mocks
            .build()
            .delete_department(&admin(workspace_id), workspace_id, department_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_manager_rank_change_needs_department_match() {
        let workspace_id = StringUuid::new_v4();
        let department_id = StringUuid::new_v4();
        let manager = Account {
            role: Role::Manager,
            workspace_id: Some(workspace_id),
            department_id: Some(StringUuid::new_v4()),
            ..Default::default()
        };
        let mut mocks = Mocks::default();
        mocks
            .department_repo
            .expect_find_by_id()
            .returning(move |id| {
                Ok(Some(Department {
                    id,
                    workspace_id,
                    ..Default::default()
                }))
            });

        let err = mocks
            .build()
            .add_rank(
                &manager,
                workspace_id,
                department_id,
                RankInput {
                    id: "senior".to_string(),
                    name: "Senior".to_string(),
                    order: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_assign_rank_unknown_rank_rejected() {
        let workspace_id = StringUuid::new_v4();
        let department_id = StringUuid::new_v4();
        let account_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.account_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Account {
                id,
                workspace_id: Some(workspace_id),
                department_id: Some(department_id),
                ..Default::default()
            }))
        });
        mocks
            .department_repo
            .expect_find_by_id()
            .returning(move |id| {
                Ok(Some(Department {
                    id,
                    workspace_id,
                    ..Default::default()
                }))
            });

        let err = mocks
            .build()
            .assign_account_rank(
                &admin(workspace_id),
                workspace_id,
                account_id,
                Some("missing-rank"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_request_cleans_attachments() {
        let workspace_id = StringUuid::new_v4();
        let mut mocks = Mocks::default();
        mocks.request_repo.expect_find_by_id().returning(move |id| {
            Ok(Some(WorkRequest {
                id,
                workspace_id,
                ..Default::default()
            }))
        });
        mocks.request_repo.expect_delete().returning(|_, _| Ok(()));
        mocks
            .attachments
            .expect_delete_for_entity()
            .times(1)
            .returning(|_| Ok(()));

        mocks
            .build()
            .delete_request(&admin(workspace_id), workspace_id, StringUuid::new_v4())
            .await
            .unwrap();
    }
}
