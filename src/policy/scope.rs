//! Row-level visibility scoping
//!
//! List endpoints and get-by-id paths derive their filters from the same
//! [`RowScope`], so a row invisible in a list is also invisible by id.

use crate::domain::{Account, Role, StringUuid, WorkRequest};
use crate::error::{AppError, Result};

/// What slice of a workspace's rows an actor may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowScope {
    /// Every row in the resolved workspace.
    Workspace,
    /// Rows in the actor's department, plus rows the actor created or is
    /// assigned to.
    DepartmentOrOwn {
        department_id: Option<StringUuid>,
        account_id: StringUuid,
    },
    /// Only rows the actor created or is assigned to.
    OwnOnly { account_id: StringUuid },
}

/// Derive the actor's row scope. Pure function of the account.
pub fn scope_filter(actor: &Account) -> RowScope {
    match actor.role {
        Role::Operator | Role::WorkspaceAdmin => RowScope::Workspace,
        Role::Manager => RowScope::DepartmentOrOwn {
            department_id: actor.department_id,
            account_id: actor.id,
        },
        Role::User | Role::Viewer => RowScope::OwnOnly {
            account_id: actor.id,
        },
    }
}

impl RowScope {
    /// Whether a request row is visible under this scope. Workspace pinning
    /// is enforced upstream by the resolver, so only intra-workspace
    /// visibility is decided here.
    pub fn permits(&self, request: &WorkRequest) -> bool {
        match self {
            RowScope::Workspace => true,
            RowScope::DepartmentOrOwn {
                department_id,
                account_id,
            } => {
                department_id.is_some_and(|d| d == request.department_id)
                    || is_own(request, *account_id)
            }
            RowScope::OwnOnly { account_id } => is_own(request, *account_id),
        }
    }
}

fn is_own(request: &WorkRequest, account_id: StringUuid) -> bool {
    request.creator_id == Some(account_id) || request.assignee_id == Some(account_id)
}

/// Department-scoped mutations (rank management, rank assignment): a Manager
/// must belong to the target department, higher roles are exempt.
pub fn require_department_match(actor: &Account, department_id: StringUuid) -> Result<()> {
    if actor.role > Role::Manager {
        return Ok(());
    }
    if actor.department_id == Some(department_id) {
        return Ok(());
    }
    tracing::warn!(
        account_id = %actor.id,
        department_id = %department_id,
        "department mismatch on scoped mutation"
    );
    Err(AppError::PermissionDenied(
        "insufficient privileges".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Account, WorkRequest};

    fn request(
        department_id: StringUuid,
        creator_id: Option<StringUuid>,
        assignee_id: Option<StringUuid>,
    ) -> WorkRequest {
        WorkRequest {
            department_id,
            creator_id,
            assignee_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_workspace_scope_sees_everything() {
        let admin = Account {
            role: Role::WorkspaceAdmin,
            ..Default::default()
        };
        let scope = scope_filter(&admin);
        assert!(scope.permits(&request(StringUuid::new_v4(), None, None)));
    }

    #[test]
    fn test_manager_sees_department_and_own() {
        let dept = StringUuid::new_v4();
        let manager = Account {
            role: Role::Manager,
            department_id: Some(dept),
            ..Default::default()
        };
        let scope = scope_filter(&manager);

        assert!(scope.permits(&request(dept, None, None)));
        // Own row outside the department is still visible.
        assert!(scope.permits(&request(StringUuid::new_v4(), Some(manager.id), None)));
        assert!(!scope.permits(&request(StringUuid::new_v4(), None, None)));
    }

    #[test]
    fn test_manager_without_department_sees_only_own() {
        let manager = Account {
            role: Role::Manager,
            department_id: None,
            ..Default::default()
        };
        let scope = scope_filter(&manager);
        assert!(scope.permits(&request(StringUuid::new_v4(), None, Some(manager.id))));
        assert!(!scope.permits(&request(StringUuid::new_v4(), None, None)));
    }

    #[test]
    fn test_user_sees_created_or_assigned() {
        let user = Account {
            role: Role::User,
            department_id: Some(StringUuid::new_v4()),
            ..Default::default()
        };
        let scope = scope_filter(&user);

        assert!(scope.permits(&request(StringUuid::new_v4(), Some(user.id), None)));
        assert!(scope.permits(&request(StringUuid::new_v4(), None, Some(user.id))));
        // Department membership alone grants nothing below Manager.
        assert!(!scope.permits(&request(user.department_id.unwrap(), None, None)));
    }

    #[test]
    fn test_department_match_exempts_admins() {
        let dept = StringUuid::new_v4();
        let admin = Account {
            role: Role::WorkspaceAdmin,
            department_id: None,
            ..Default::default()
        };
        assert!(require_department_match(&admin, dept).is_ok());

        let manager = Account {
            role: Role::Manager,
            department_id: Some(StringUuid::new_v4()),
            ..Default::default()
        };
        assert!(matches!(
            require_department_match(&manager, dept),
            Err(AppError::PermissionDenied(_))
        ));
    }
}
