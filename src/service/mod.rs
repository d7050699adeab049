//! Business logic layer

pub mod account;
pub mod auth;
pub mod forms;
pub mod workflow;
pub mod workspace;

pub use account::AccountService;
pub use auth::{AuthService, LoginResponse};
pub use forms::FormService;
pub use workflow::WorkflowService;
pub use workspace::WorkspaceService;
