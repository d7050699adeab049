//! Authentication business logic

use crate::domain::{Account, StringUuid};
use crate::error::{AppError, Result};
use crate::jwt::JwtManager;
use crate::repository::{AccountRepository, WorkspaceRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Hash a password with argon2id and a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored argon2 hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid hash format: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Successful login payload
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub account: Account,
}

pub struct AuthService<AR: AccountRepository, WR: WorkspaceRepository> {
    account_repo: Arc<AR>,
    workspace_repo: Arc<WR>,
    jwt: Arc<JwtManager>,
    token_ttl_secs: i64,
}

impl<AR: AccountRepository, WR: WorkspaceRepository> AuthService<AR, WR> {
    pub fn new(
        account_repo: Arc<AR>,
        workspace_repo: Arc<WR>,
        jwt: Arc<JwtManager>,
        token_ttl_secs: i64,
    ) -> Self {
        Self {
            account_repo,
            workspace_repo,
            jwt,
            token_ttl_secs,
        }
    }

    /// The account's workspace must currently accept sessions. Checked on
    /// every authenticated call, so suspending a workspace retroactively
    /// kills credentials that were minted while it was active.
    async fn check_workspace(&self, account: &Account) -> Result<()> {
        let Some(workspace_id) = account.workspace_id else {
            return Ok(());
        };
        let workspace = self
            .workspace_repo
            .find_by_id(workspace_id)
            .await?
            .ok_or(AppError::TenantSuspended)?;
        if !workspace.accepts_sessions() {
            return Err(AppError::TenantSuspended);
        }
        Ok(())
    }

    /// Exchange email and password for an access token.
    ///
    /// A missing account and a wrong password produce the same error, so
    /// login cannot be used to enumerate addresses.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let invalid = || AppError::Unauthenticated("Invalid email or password".to_string());

        let account = self
            .account_repo
            .find_by_email(email)
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(password, &account.password_hash)? {
            return Err(invalid());
        }
        if !account.is_active {
            return Err(AppError::AccountDisabled);
        }
        self.check_workspace(&account).await?;

        let access_token = self.jwt.create_access_token(
            account.id,
            &account.email,
            account.role,
            account.workspace_id,
        )?;

        info!(account_id = %account.id, "login succeeded");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.token_ttl_secs,
            account,
        })
    }

    /// Verify a bearer token and load the live account behind it.
    pub async fn authenticate(&self, token: &str) -> Result<Account> {
        let claims = self
            .jwt
            .verify_access_token(token)
            .map_err(|_| AppError::Unauthenticated("Invalid or expired token".to_string()))?;
        let account_id = StringUuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthenticated("Invalid token subject".to_string()))?;

        let account = self
            .account_repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Unknown account".to_string()))?;
        if !account.is_active {
            return Err(AppError::AccountDisabled);
        }
        self.check_workspace(&account).await?;

        Ok(account)
    }
}
