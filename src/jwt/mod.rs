//! JWT token handling

use crate::config::JwtConfig;
use crate::domain::{Role, StringUuid};
use crate::error::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const AUDIENCE: &str = "opsdesk";

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (account ID)
    pub sub: String,
    /// Email
    pub email: String,
    /// Role at issue time. Informational; authorization re-reads the account.
    pub role: Role,
    /// Workspace membership at issue time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Create a Validation with a strict leeway (5 seconds) instead of the
    /// default 60 seconds, so revoked accounts lose access promptly while
    /// still tolerating minor clock skew.
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v.set_audience(&[AUDIENCE]);
        v.set_issuer(&[&self.config.issuer]);
        v
    }

    /// Create an access token for an authenticated account
    pub fn create_access_token(
        &self,
        account_id: StringUuid,
        email: &str,
        role: Role,
        workspace_id: Option<StringUuid>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.access_token_ttl_secs);

        let claims = AccessClaims {
            sub: account_id.to_string(),
            email: email.to_string(),
            role,
            workspace_id: workspace_id.map(|id| id.to_string()),
            iss: self.config.issuer.clone(),
            aud: AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let header = Header::new(Algorithm::HS256);
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Verify an access token's signature, issuer, audience and expiry
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims> {
        let token_data =
            decode::<AccessClaims>(token, &self.decoding_key, &self.strict_validation())?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(ttl: i64) -> JwtManager {
        JwtManager::new(JwtConfig {
            secret: "test-secret-at-least-32-bytes-long!".to_string(),
            issuer: "opsdesk-test".to_string(),
            access_token_ttl_secs: ttl,
        })
    }

    #[test]
    fn test_create_and_verify_roundtrip() {
        let manager = manager(3600);
        let account_id = StringUuid::new_v4();
        let workspace_id = StringUuid::new_v4();

        let token = manager
            .create_access_token(account_id, "amy@example.com", Role::Manager, Some(workspace_id))
            .unwrap();
        let claims = manager.verify_access_token(&token).unwrap();

        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.email, "amy@example.com");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.workspace_id, Some(workspace_id.to_string()));
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = manager(-120);
        let token = manager
            .create_access_token(StringUuid::new_v4(), "x@example.com", Role::User, None)
            .unwrap();
        assert!(manager.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = manager(3600)
            .create_access_token(StringUuid::new_v4(), "x@example.com", Role::User, None)
            .unwrap();
        let other = JwtManager::new(JwtConfig {
            secret: "a-completely-different-signing-secret".to_string(),
            issuer: "opsdesk-test".to_string(),
            access_token_ttl_secs: 3600,
        });
        assert!(other.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let minter = JwtManager::new(JwtConfig {
            secret: "test-secret-at-least-32-bytes-long!".to_string(),
            issuer: "someone-else".to_string(),
            access_token_ttl_secs: 3600,
        });
        let token = minter
            .create_access_token(StringUuid::new_v4(), "x@example.com", Role::User, None)
            .unwrap();
        assert!(manager(3600).verify_access_token(&token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(manager(3600).verify_access_token("not.a.jwt").is_err());
    }
}
