//! HTTP middleware for Opsdesk Core
//!
//! Currently holds the `Actor` authentication extractor, which combines
//! bearer-token verification with ambient workspace resolution.

pub mod auth;

pub use auth::Actor;
