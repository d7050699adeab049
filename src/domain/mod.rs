//! Domain models for OpsDesk Core

pub mod account;
pub mod common;
pub mod department;
pub mod form;
pub mod request;
pub mod workspace;

pub use account::*;
pub use common::*;
pub use department::*;
pub use form::*;
pub use request::*;
pub use workspace::*;
