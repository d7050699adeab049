//! Centralized permission checking with security logging

use crate::domain::{Account, Role};
use crate::error::{AppError, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Action names used in the permission table. Unknown names deny by default.
pub mod actions {
    pub const CREATE_ACCOUNT: &str = "create_account";
    pub const EDIT_ACCOUNT: &str = "edit_account";
    pub const DELETE_ACCOUNT: &str = "delete_account";
    pub const MANAGE_ROLES: &str = "manage_roles";
    pub const VIEW_ALL_ACCOUNTS: &str = "view_all_accounts";

    pub const CREATE_WORKSPACE: &str = "create_workspace";
    pub const EDIT_WORKSPACE: &str = "edit_workspace";
    pub const DELETE_WORKSPACE: &str = "delete_workspace";
    pub const SUSPEND_WORKSPACE: &str = "suspend_workspace";
    pub const VIEW_WORKSPACE_STATS: &str = "view_workspace_stats";

    pub const CREATE_DEPARTMENT: &str = "create_department";
    pub const EDIT_DEPARTMENT: &str = "edit_department";
    pub const DELETE_DEPARTMENT: &str = "delete_department";
    pub const VIEW_DEPARTMENTS: &str = "view_departments";
    pub const VIEW_DEPARTMENT_MEMBERS: &str = "view_department_members";
    pub const MANAGE_DEPARTMENT_RANKS: &str = "manage_department_ranks";
    pub const ASSIGN_ACCOUNT_RANK: &str = "assign_account_rank";
    pub const ASSIGN_DEPARTMENTS: &str = "assign_departments";

    pub const CREATE_REQUEST: &str = "create_request";
    pub const EDIT_REQUEST: &str = "edit_request";
    pub const EDIT_OWN_REQUEST: &str = "edit_own_request";
    pub const DELETE_REQUEST: &str = "delete_request";
    pub const DELETE_OWN_REQUEST: &str = "delete_own_request";
    pub const ASSIGN_REQUEST: &str = "assign_request";
    pub const VIEW_ALL_REQUESTS: &str = "view_all_requests";
    pub const VIEW_DEPARTMENT_REQUESTS: &str = "view_department_requests";
    pub const VIEW_OWN_REQUESTS: &str = "view_own_requests";

    pub const CREATE_FORM_TEMPLATE: &str = "create_form_template";
    pub const EDIT_FORM_TEMPLATE: &str = "edit_form_template";
    pub const DELETE_FORM_TEMPLATE: &str = "delete_form_template";
    pub const VIEW_FORM_TEMPLATES: &str = "view_form_templates";
    pub const SUBMIT_FORM: &str = "submit_form";
    pub const VIEW_SUBMISSIONS: &str = "view_submissions";
    pub const VIEW_OWN_SUBMISSIONS: &str = "view_own_submissions";
    pub const DELETE_SUBMISSION: &str = "delete_submission";

    pub const VIEW_AUDIT_LOGS: &str = "view_audit_logs";
}

use actions::*;

lazy_static! {
    static ref PERMISSIONS: HashMap<Role, &'static [&'static str]> = {
        let mut table: HashMap<Role, &'static [&'static str]> = HashMap::new();
        table.insert(
            Role::Operator,
            &[
                CREATE_ACCOUNT,
                EDIT_ACCOUNT,
                DELETE_ACCOUNT,
                MANAGE_ROLES,
                VIEW_ALL_ACCOUNTS,
                CREATE_WORKSPACE,
                EDIT_WORKSPACE,
                DELETE_WORKSPACE,
                SUSPEND_WORKSPACE,
                VIEW_WORKSPACE_STATS,
                CREATE_DEPARTMENT,
                EDIT_DEPARTMENT,
                DELETE_DEPARTMENT,
                VIEW_DEPARTMENTS,
                VIEW_DEPARTMENT_MEMBERS,
                MANAGE_DEPARTMENT_RANKS,
                ASSIGN_ACCOUNT_RANK,
                ASSIGN_DEPARTMENTS,
                CREATE_REQUEST,
                EDIT_REQUEST,
                DELETE_REQUEST,
                ASSIGN_REQUEST,
                VIEW_ALL_REQUESTS,
                CREATE_FORM_TEMPLATE,
                EDIT_FORM_TEMPLATE,
                DELETE_FORM_TEMPLATE,
                VIEW_FORM_TEMPLATES,
                SUBMIT_FORM,
                VIEW_SUBMISSIONS,
                VIEW_OWN_SUBMISSIONS,
                DELETE_SUBMISSION,
                VIEW_AUDIT_LOGS,
            ],
        );
        table.insert(
            Role::WorkspaceAdmin,
            &[
                CREATE_ACCOUNT,
                EDIT_ACCOUNT,
                DELETE_ACCOUNT,
                MANAGE_ROLES,
                VIEW_ALL_ACCOUNTS,
                CREATE_DEPARTMENT,
                EDIT_DEPARTMENT,
                DELETE_DEPARTMENT,
                VIEW_DEPARTMENTS,
                VIEW_DEPARTMENT_MEMBERS,
                MANAGE_DEPARTMENT_RANKS,
                ASSIGN_ACCOUNT_RANK,
                ASSIGN_DEPARTMENTS,
                CREATE_REQUEST,
                EDIT_REQUEST,
                DELETE_REQUEST,
                ASSIGN_REQUEST,
                VIEW_ALL_REQUESTS,
                CREATE_FORM_TEMPLATE,
                EDIT_FORM_TEMPLATE,
                DELETE_FORM_TEMPLATE,
                VIEW_FORM_TEMPLATES,
                SUBMIT_FORM,
                VIEW_SUBMISSIONS,
                DELETE_SUBMISSION,
                VIEW_AUDIT_LOGS,
            ],
        );
        table.insert(
            Role::Manager,
            &[
                CREATE_ACCOUNT,
                CREATE_REQUEST,
                EDIT_REQUEST,
                DELETE_REQUEST,
                ASSIGN_REQUEST,
                VIEW_DEPARTMENT_REQUESTS,
                VIEW_DEPARTMENTS,
                VIEW_DEPARTMENT_MEMBERS,
                MANAGE_DEPARTMENT_RANKS,
                ASSIGN_ACCOUNT_RANK,
                CREATE_FORM_TEMPLATE,
                EDIT_FORM_TEMPLATE,
                VIEW_FORM_TEMPLATES,
                SUBMIT_FORM,
                VIEW_SUBMISSIONS,
                DELETE_SUBMISSION,
            ],
        );
        table.insert(
            Role::User,
            &[
                CREATE_REQUEST,
                EDIT_OWN_REQUEST,
                DELETE_OWN_REQUEST,
                VIEW_OWN_REQUESTS,
                VIEW_DEPARTMENTS,
                VIEW_DEPARTMENT_MEMBERS,
                VIEW_FORM_TEMPLATES,
                SUBMIT_FORM,
                VIEW_OWN_SUBMISSIONS,
            ],
        );
        table.insert(
            Role::Viewer,
            &[
                VIEW_OWN_REQUESTS,
                DELETE_OWN_REQUEST,
                VIEW_DEPARTMENTS,
                VIEW_FORM_TEMPLATES,
            ],
        );
        table
    };
}

pub fn has_permission(role: Role, action: &str) -> bool {
    PERMISSIONS
        .get(&role)
        .map(|allowed| allowed.contains(&action))
        .unwrap_or(false)
}

/// The error message is intentionally generic. Specifics stay in the log.
pub fn require_permission(actor: &Account, action: &str) -> Result<()> {
    if has_permission(actor.role, action) {
        return Ok(());
    }
    tracing::warn!(
        account_id = %actor.id,
        role = %actor.role,
        action,
        "unauthorized action attempt"
    );
    Err(AppError::PermissionDenied(
        "insufficient privileges".to_string(),
    ))
}

pub fn require_rank(actor: &Account, min_role: Role) -> Result<()> {
    if actor.role >= min_role {
        return Ok(());
    }
    tracing::warn!(
        account_id = %actor.id,
        role = %actor.role,
        required = %min_role,
        "role check failed"
    );
    Err(AppError::InsufficientRank(format!(
        "requires {} or higher",
        min_role
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Account;

    fn account_with(role: Role) -> Account {
        Account {
            role,
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_action_denied_for_every_role() {
        for role in [
            Role::Operator,
            Role::WorkspaceAdmin,
            Role::Manager,
            Role::User,
            Role::Viewer,
        ] {
            assert!(!has_permission(role, "launch_missiles"));
        }
    }

    #[test]
    fn test_workspace_actions_operator_only() {
        assert!(has_permission(Role::Operator, actions::CREATE_WORKSPACE));
        assert!(has_permission(Role::Operator, actions::SUSPEND_WORKSPACE));
        assert!(!has_permission(
            Role::WorkspaceAdmin,
            actions::CREATE_WORKSPACE
        ));
        assert!(!has_permission(
            Role::WorkspaceAdmin,
            actions::SUSPEND_WORKSPACE
        ));
    }

    #[test]
    fn test_manager_cannot_manage_roles() {
        assert!(has_permission(Role::Manager, actions::CREATE_ACCOUNT));
        assert!(!has_permission(Role::Manager, actions::MANAGE_ROLES));
        assert!(!has_permission(Role::Manager, actions::DELETE_ACCOUNT));
        assert!(has_permission(Role::Manager, actions::ASSIGN_REQUEST));
    }

    #[test]
    fn test_viewer_may_delete_own_requests_only() {
        assert!(has_permission(Role::Viewer, actions::DELETE_OWN_REQUEST));
        assert!(!has_permission(Role::Viewer, actions::DELETE_REQUEST));
    }

    #[test]
    fn test_user_limited_to_own_rows() {
        assert!(has_permission(Role::User, actions::EDIT_OWN_REQUEST));
        assert!(!has_permission(Role::User, actions::EDIT_REQUEST));
        assert!(!has_permission(Role::User, actions::ASSIGN_REQUEST));
    }

    #[test]
    fn test_require_permission_generic_message() {
        let viewer = account_with(Role::Viewer);
        let err = require_permission(&viewer, actions::CREATE_REQUEST).unwrap_err();
        match err {
            AppError::PermissionDenied(msg) => {
                assert_eq!(msg, "insufficient privileges");
            }
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_require_rank() {
        let manager = account_with(Role::Manager);
        assert!(require_rank(&manager, Role::User).is_ok());
        assert!(require_rank(&manager, Role::Manager).is_ok());
        assert!(matches!(
            require_rank(&manager, Role::WorkspaceAdmin),
            Err(AppError::InsufficientRank(_))
        ));
    }
}
