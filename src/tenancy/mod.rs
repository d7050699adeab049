//! Workspace (tenant) resolution
//!
//! Two layers: host-based resolution of the ambient workspace hint from the
//! incoming connection, and role-aware resolution of the effective workspace
//! for an authenticated call.

use crate::domain::{Account, StringUuid};
use crate::error::{AppError, Result};
use axum::http::HeaderMap;
use std::net::IpAddr;
use std::str::FromStr;

pub const WORKSPACE_ID_HEADER: &str = "x-workspace-id";
pub const WORKSPACE_SLUG_HEADER: &str = "x-workspace-slug";
pub const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";

/// One entry of the trusted-proxy allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TrustEntry {
    Any,
    Ip(IpAddr),
    Cidr { network: IpAddr, prefix: u8 },
    /// Exact hostname or dot-suffix match.
    HostSuffix(String),
}

impl TrustEntry {
    fn parse(raw: &str) -> Self {
        if raw == "*" {
            return TrustEntry::Any;
        }
        if let Some((base, prefix)) = raw.split_once('/') {
            if let (Ok(network), Ok(prefix)) = (IpAddr::from_str(base), prefix.parse::<u8>()) {
                return TrustEntry::Cidr { network, prefix };
            }
        }
        if let Ok(ip) = IpAddr::from_str(raw) {
            return TrustEntry::Ip(ip);
        }
        TrustEntry::HostSuffix(raw.to_string())
    }

    fn matches(&self, peer: &str) -> bool {
        match self {
            TrustEntry::Any => true,
            TrustEntry::Ip(ip) => IpAddr::from_str(peer).map(|p| p == *ip).unwrap_or(false),
            TrustEntry::Cidr { network, prefix } => IpAddr::from_str(peer)
                .map(|p| ip_in_cidr(p, *network, *prefix))
                .unwrap_or(false),
            TrustEntry::HostSuffix(suffix) => {
                peer == suffix || peer.ends_with(&format!(".{}", suffix))
            }
        }
    }
}

fn ip_in_cidr(ip: IpAddr, network: IpAddr, prefix: u8) -> bool {
    match (ip, network) {
        (IpAddr::V4(a), IpAddr::V4(n)) => {
            if prefix == 0 {
                return true;
            }
            if prefix > 32 {
                return false;
            }
            let shift = 32 - u32::from(prefix);
            (u32::from(a) >> shift) == (u32::from(n) >> shift)
        }
        (IpAddr::V6(a), IpAddr::V6(n)) => {
            if prefix == 0 {
                return true;
            }
            if prefix > 128 {
                return false;
            }
            let shift = 128 - u32::from(prefix);
            (u128::from(a) >> shift) == (u128::from(n) >> shift)
        }
        _ => false,
    }
}

/// Parsed trusted-proxy allow-list. Forwarded headers are honored only when
/// the literal peer address matches an entry.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    entries: Vec<TrustEntry>,
}

impl TrustedProxies {
    pub fn new(raw_entries: &[String]) -> Self {
        Self {
            entries: raw_entries
                .iter()
                .map(|e| TrustEntry::parse(e.trim()))
                .collect(),
        }
    }

    pub fn is_trusted(&self, peer: Option<&str>) -> bool {
        let Some(peer) = peer else { return false };
        self.entries.iter().any(|entry| entry.matches(peer))
    }
}

/// The workspace a connection points at, before any identity check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkspaceHint {
    #[default]
    None,
    Id(StringUuid),
    Slug(String),
}

/// Derive the ambient workspace hint from the peer address and headers.
///
/// An `x-workspace-id` header from a trusted peer must be a valid UUID;
/// anything else is a client error rather than a silent fallthrough.
pub fn workspace_hint(
    proxies: &TrustedProxies,
    peer: Option<&str>,
    headers: &HeaderMap,
) -> Result<WorkspaceHint> {
    let trusted = proxies.is_trusted(peer);

    if trusted {
        if let Some(raw) = header_str(headers, WORKSPACE_ID_HEADER) {
            let id = StringUuid::parse_str(raw)
                .map_err(|_| AppError::Validation("invalid x-workspace-id header".to_string()))?;
            return Ok(WorkspaceHint::Id(id));
        }
        if let Some(slug) = header_str(headers, WORKSPACE_SLUG_HEADER) {
            return Ok(WorkspaceHint::Slug(slug.to_string()));
        }
    }

    let host = effective_host(trusted, headers);
    match extract_subdomain(&host) {
        Some(slug) => Ok(WorkspaceHint::Slug(slug)),
        None => Ok(WorkspaceHint::None),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The host the client actually addressed: `x-forwarded-host` from a trusted
/// peer, otherwise the literal `Host` header. Port and forwarding-chain tails
/// are stripped.
fn effective_host(trusted: bool, headers: &HeaderMap) -> String {
    let forwarded = if trusted {
        header_str(headers, FORWARDED_HOST_HEADER)
    } else {
        None
    };
    let raw = forwarded
        .or_else(|| header_str(headers, "host"))
        .unwrap_or_default();
    raw.split(',')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Leftmost label of a host with at least three labels. IP-literal hosts
/// carry no subdomain.
pub fn extract_subdomain(host: &str) -> Option<String> {
    if host.is_empty() || IpAddr::from_str(host).is_ok() {
        return None;
    }
    let labels: Vec<&str> = host.split('.').filter(|p| !p.is_empty()).collect();
    if labels.len() >= 3 {
        Some(labels[0].to_string())
    } else {
        None
    }
}

/// Resolve the effective workspace for an authenticated call.
///
/// Operators may pick any workspace: explicit candidate first, then the
/// ambient hint, then their own membership. Everyone else is pinned to their
/// membership, and any conflicting candidate or ambient hint is rejected.
pub fn resolve_workspace(
    candidate: Option<StringUuid>,
    ambient: Option<StringUuid>,
    actor: &Account,
) -> Result<StringUuid> {
    if actor.role.is_operator() {
        return candidate
            .or(ambient)
            .or(actor.workspace_id)
            .ok_or(AppError::TenantRequired);
    }

    let own = actor.workspace_id.ok_or(AppError::TenantRequired)?;
    if candidate.is_some_and(|c| c != own) {
        return Err(AppError::TenantMismatch);
    }
    if ambient.is_some_and(|a| a != own) {
        return Err(AppError::TenantMismatch);
    }
    Ok(own)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use axum::http::HeaderValue;
    use rstest::rstest;

    fn proxies(entries: &[&str]) -> TrustedProxies {
        TrustedProxies::new(&entries.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_str(name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[rstest]
    #[case("10.0.0.5", &["10.0.0.5"], true)]
    #[case("10.0.0.6", &["10.0.0.5"], false)]
    #[case("10.0.1.200", &["10.0.0.0/16"], true)]
    #[case("10.1.0.1", &["10.0.0.0/16"], false)]
    #[case("::1", &["::1"], true)]
    #[case("fd00::42", &["fd00::/8"], true)]
    #[case("anything", &["*"], true)]
    #[case("lb-3.internal.example", &["internal.example"], true)]
    #[case("internal.example", &["internal.example"], true)]
    #[case("evilinternal.example", &["internal.example"], false)]
    fn test_trusted_proxy_matching(
        #[case] peer: &str,
        #[case] entries: &[&str],
        #[case] expected: bool,
    ) {
        assert_eq!(proxies(entries).is_trusted(Some(peer)), expected);
    }

    #[test]
    fn test_unknown_peer_never_trusted() {
        assert!(!proxies(&["*"]).is_trusted(None));
    }

    #[rstest]
    #[case("apple.crm.example", Some("apple"))]
    #[case("crm.example", None)]
    #[case("localhost", None)]
    #[case("192.168.1.10", None)]
    #[case("a.b.c.d.example", Some("a"))]
    fn test_subdomain_extraction(#[case] host: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_subdomain(host).as_deref(), expected);
    }

    #[test]
    fn test_untrusted_peer_headers_ignored() {
        let id = StringUuid::new_v4();
        let hint = workspace_hint(
            &proxies(&["10.0.0.1"]),
            Some("203.0.113.7"),
            &headers(&[
                ("x-workspace-id", &id.to_string()),
                ("x-forwarded-host", "spoofed.crm.example"),
                ("host", "crm.example"),
            ]),
        )
        .unwrap();
        assert_eq!(hint, WorkspaceHint::None);
    }

    #[test]
    fn test_trusted_peer_id_header_wins() {
        let id = StringUuid::new_v4();
        let hint = workspace_hint(
            &proxies(&["10.0.0.1"]),
            Some("10.0.0.1"),
            &headers(&[
                ("x-workspace-id", &id.to_string()),
                ("x-workspace-slug", "apple"),
                ("host", "pear.crm.example"),
            ]),
        )
        .unwrap();
        assert_eq!(hint, WorkspaceHint::Id(id));
    }

    #[test]
    fn test_trusted_peer_invalid_id_header_rejected() {
        let err = workspace_hint(
            &proxies(&["*"]),
            Some("10.0.0.1"),
            &headers(&[("x-workspace-id", "not-a-uuid")]),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_forwarded_host_subdomain() {
        let hint = workspace_hint(
            &proxies(&["10.0.0.1"]),
            Some("10.0.0.1"),
            &headers(&[
                ("x-forwarded-host", "Apple.CRM.example:8443"),
                ("host", "10.0.0.1:8080"),
            ]),
        )
        .unwrap();
        assert_eq!(hint, WorkspaceHint::Slug("apple".to_string()));
    }

    #[test]
    fn test_resolve_operator_precedence() {
        let own = StringUuid::new_v4();
        let ambient = StringUuid::new_v4();
        let candidate = StringUuid::new_v4();
        let operator = Account {
            role: Role::Operator,
            workspace_id: Some(own),
            ..Default::default()
        };

        assert_eq!(
            resolve_workspace(Some(candidate), Some(ambient), &operator).unwrap(),
            candidate
        );
        assert_eq!(
            resolve_workspace(None, Some(ambient), &operator).unwrap(),
            ambient
        );
        assert_eq!(resolve_workspace(None, None, &operator).unwrap(), own);

        let homeless = Account {
            role: Role::Operator,
            workspace_id: None,
            ..Default::default()
        };
        assert!(matches!(
            resolve_workspace(None, None, &homeless),
            Err(AppError::TenantRequired)
        ));
    }

    #[test]
    fn test_resolve_member_pinned() {
        let own = StringUuid::new_v4();
        let other = StringUuid::new_v4();
        let user = Account {
            role: Role::User,
            workspace_id: Some(own),
            ..Default::default()
        };

        assert_eq!(resolve_workspace(None, None, &user).unwrap(), own);
        assert_eq!(resolve_workspace(Some(own), Some(own), &user).unwrap(), own);
        assert!(matches!(
            resolve_workspace(Some(other), None, &user),
            Err(AppError::TenantMismatch)
        ));
        assert!(matches!(
            resolve_workspace(None, Some(other), &user),
            Err(AppError::TenantMismatch)
        ));

        let unattached = Account {
            role: Role::User,
            workspace_id: None,
            ..Default::default()
        };
        assert!(matches!(
            resolve_workspace(None, None, &unattached),
            Err(AppError::TenantRequired)
        ));
    }
}
