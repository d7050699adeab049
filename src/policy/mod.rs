//! Access policy: permission table and row-level scoping

pub mod permissions;
pub mod scope;

pub use permissions::{actions, has_permission, require_permission, require_rank};
pub use scope::{require_department_match, scope_filter, RowScope};
