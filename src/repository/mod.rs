//! Data access layer (Repository pattern)

pub mod account;
pub mod audit;
pub mod department;
pub mod form;
pub mod request;
pub mod workspace;

pub use account::AccountRepository;
pub use audit::AuditRepository;
pub use department::DepartmentRepository;
pub use form::FormRepository;
pub use request::RequestRepository;
pub use workspace::{NewWorkspaceAdmin, WorkspaceRepository};
