//! Workspace (tenant) domain model

use super::common::{Metadata, StringUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Workspace lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    #[default]
    Active,
    Suspended,
    /// Terminal state; an archived workspace is never reactivated.
    Archived,
}

impl std::str::FromStr for WorkspaceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(WorkspaceStatus::Active),
            "suspended" => Ok(WorkspaceStatus::Suspended),
            "archived" => Ok(WorkspaceStatus::Archived),
            _ => Err(format!("Unknown workspace status: {}", s)),
        }
    }
}

impl std::fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkspaceStatus::Active => write!(f, "active"),
            WorkspaceStatus::Suspended => write!(f, "suspended"),
            WorkspaceStatus::Archived => write!(f, "archived"),
        }
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for WorkspaceStatus {
    fn decode(
        value: sqlx::mysql::MySqlValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let s: String = sqlx::Decode::<'r, sqlx::MySql>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl sqlx::Type<sqlx::MySql> for WorkspaceStatus {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for WorkspaceStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// Workspace entity: the isolation boundary for one customer organization.
/// Every workspace-owned entity carries exactly one workspace id, set at
/// creation and never changed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workspace {
    pub id: StringUuid,
    pub name: String,
    /// Unique routing handle (subdomain-like)
    pub slug: String,
    pub status: WorkspaceStatus,
    pub is_active: bool,
    #[sqlx(json)]
    pub settings: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_id: Option<StringUuid>,
    pub updated_by_id: Option<StringUuid>,
}

impl Workspace {
    /// Whether sessions of this workspace's users are currently honored.
    pub fn accepts_sessions(&self) -> bool {
        self.is_active && self.status == WorkspaceStatus::Active
    }
}

impl Default for Workspace {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            name: String::new(),
            slug: String::new(),
            status: WorkspaceStatus::Active,
            is_active: true,
            settings: Metadata::new(),
            created_at: now,
            updated_at: now,
            created_by_id: None,
            updated_by_id: None,
        }
    }
}

/// Input for creating a new workspace along with its first admin account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWorkspaceInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 63), custom(function = "validate_slug"))]
    pub slug: String,
    #[validate(email)]
    pub admin_email: String,
    #[validate(length(min = 1, max = 255))]
    pub admin_full_name: String,
    #[validate(length(min = 8, max = 128))]
    pub admin_password: String,
}

/// Input for updating a workspace
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWorkspaceInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub status: Option<WorkspaceStatus>,
    pub settings: Option<Metadata>,
}

/// Validate slug format (lowercase alphanumeric with hyphens)
fn validate_slug(slug: &str) -> Result<(), validator::ValidationError> {
    if SLUG_REGEX.is_match(slug) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_slug"))
    }
}

lazy_static::lazy_static! {
    pub static ref SLUG_REGEX: regex::Regex = regex::Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}
