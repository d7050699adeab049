//! Authentication extractor
//!
//! Provides the `Actor` extractor: handlers that take an `Actor` get the
//! authenticated account plus the ambient workspace derived from the
//! connection (trusted-proxy headers or the request subdomain).

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::net::SocketAddr;

use crate::domain::{Account, StringUuid};
use crate::error::{AppError, Result};
use crate::repository::WorkspaceRepository;
use crate::server::AppState;
use crate::tenancy::{self, WorkspaceHint};

/// An authenticated caller.
///
/// `ambient_workspace` is the workspace the connection points at, already
/// resolved to an id; `None` when the request carried no usable hint. It is
/// combined with any explicit per-request candidate via [`Actor::workspace`].
#[derive(Debug, Clone)]
pub struct Actor {
    pub account: Account,
    pub ambient_workspace: Option<StringUuid>,
}

impl Actor {
    /// Resolve the effective workspace for this call, honoring an explicit
    /// candidate (query parameter or body field) over the ambient hint.
    pub fn workspace(&self, candidate: Option<StringUuid>) -> Result<StringUuid> {
        tenancy::resolve_workspace(candidate, self.ambient_workspace, &self.account)
    }
}

/// Extract and validate the Bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let raw = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthenticated("invalid authorization header".to_string()))?;

    raw.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthenticated("authorization header must use Bearer scheme".to_string())
    })
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers)?;
        let account = state.auth.authenticate(token).await?;

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string());
        let hint = tenancy::workspace_hint(&state.trusted_proxies, peer.as_deref(), &parts.headers)?;

        let ambient_workspace = match hint {
            WorkspaceHint::Id(id) => {
                // Only trusted proxies set this header, so an unknown id is a
                // misconfiguration worth surfacing.
                let workspace = state.workspace_repo.find_by_id(id).await?.ok_or_else(|| {
                    AppError::Validation("unknown workspace in x-workspace-id header".to_string())
                })?;
                Some(workspace.id)
            }
            // A subdomain that matches no workspace is not an error; the
            // request may still name its workspace explicitly.
            WorkspaceHint::Slug(slug) => state
                .workspace_repo
                .find_by_slug(&slug)
                .await?
                .map(|w| w.id),
            WorkspaceHint::None => None,
        };

        Ok(Actor {
            account,
            ambient_workspace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        let headers = headers_with_auth("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header_rejected() {
        let headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let headers = headers_with_auth("Basic dXNlcjpwYXNz");
        assert!(matches!(
            bearer_token(&headers),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_actor_workspace_resolution_uses_ambient() {
        use crate::domain::Role;

        let workspace_id = StringUuid::new_v4();
        let actor = Actor {
            account: Account {
                role: Role::Operator,
                workspace_id: None,
                ..Default::default()
            },
            ambient_workspace: Some(workspace_id),
        };
        assert_eq!(actor.workspace(None).unwrap(), workspace_id);
    }
}
