//! Opsdesk Core - Multi-tenant workflow service backend
//!
//! This crate provides the tenant-scoped access-control and workflow engine
//! behind the Opsdesk REST API: workspace isolation, role-based permissions,
//! department/rank registry, the request lifecycle state machine, and the
//! form-to-request bridge.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod policy;
pub mod repository;
pub mod server;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod tenancy;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
