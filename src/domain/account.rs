//! Account (user) domain model

use super::common::{Metadata, StringUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Global role, totally ordered by rank (declaration order is ascending so
/// the derived `Ord` is the role hierarchy: Viewer < User < Manager <
/// WorkspaceAdmin < Operator).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Viewer,
    #[default]
    User,
    Manager,
    WorkspaceAdmin,
    /// Platform operator: tenant-less, cross-workspace authority.
    Operator,
}

impl Role {
    /// Numeric rank used in audit output; higher means more authority.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Viewer => 1,
            Role::User => 2,
            Role::Manager => 3,
            Role::WorkspaceAdmin => 4,
            Role::Operator => 5,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Role::Operator)
    }

    /// Roles that must be pinned to a workspace.
    pub fn requires_workspace(&self) -> bool {
        !self.is_operator()
    }

    /// Roles that must belong to a department.
    pub fn requires_department(&self) -> bool {
        matches!(self, Role::Manager | Role::User)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VIEWER" => Ok(Role::Viewer),
            "USER" => Ok(Role::User),
            "MANAGER" => Ok(Role::Manager),
            "WORKSPACE_ADMIN" => Ok(Role::WorkspaceAdmin),
            "OPERATOR" => Ok(Role::Operator),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Viewer => write!(f, "VIEWER"),
            Role::User => write!(f, "USER"),
            Role::Manager => write!(f, "MANAGER"),
            Role::WorkspaceAdmin => write!(f, "WORKSPACE_ADMIN"),
            Role::Operator => write!(f, "OPERATOR"),
        }
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for Role {
    fn decode(
        value: sqlx::mysql::MySqlValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let s: String = sqlx::Decode::<'r, sqlx::MySql>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl sqlx::Type<sqlx::MySql> for Role {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for Role {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// Account entity.
///
/// Invariants (enforced by `AccountService`): non-operator roles carry a
/// workspace id; Manager and User additionally carry a department id.
/// Accounts are soft-deleted only (`is_active = false`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: StringUuid,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    /// Null only for the Operator role.
    pub workspace_id: Option<StringUuid>,
    pub department_id: Option<StringUuid>,
    #[sqlx(json)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_id: Option<StringUuid>,
    pub updated_by_id: Option<StringUuid>,
}

const RANK_ID_KEY: &str = "rank_id";

impl Account {
    /// Department-rank key, stored as auxiliary metadata.
    pub fn rank_id(&self) -> Option<&str> {
        self.metadata.get_str(RANK_ID_KEY)
    }

    pub fn set_rank_id(&mut self, rank_id: Option<&str>) {
        match rank_id {
            Some(id) => self.metadata.set_str(RANK_ID_KEY, id),
            None => {
                self.metadata.remove(RANK_ID_KEY);
            }
        }
    }
}

impl Default for Account {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            email: String::new(),
            full_name: String::new(),
            password_hash: String::new(),
            role: Role::User,
            is_active: true,
            workspace_id: None,
            department_id: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            created_by_id: None,
            updated_by_id: None,
        }
    }
}

/// Input for creating an account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAccountInput {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
    pub workspace_id: Option<StringUuid>,
    pub department_id: Option<StringUuid>,
}

/// Input for updating an account.
///
/// `department_id` is doubly optional: absent means "leave unchanged",
/// `null` means "detach from department".
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAccountInput {
    #[validate(length(min = 1, max = 255))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, with = "double_option")]
    pub department_id: Option<Option<StringUuid>>,
    pub is_active: Option<bool>,
}

/// Input for changing an account's role
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRoleInput {
    pub new_role: Role,
    pub department_id: Option<StringUuid>,
}

/// Serde helper distinguishing "field absent" from "field null"
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(Some(Option::<T>::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_total_order() {
        assert!(Role::Operator > Role::WorkspaceAdmin);
        assert!(Role::WorkspaceAdmin > Role::Manager);
        assert!(Role::Manager > Role::User);
        assert!(Role::User > Role::Viewer);
    }

    #[test]
    fn test_role_requirements() {
        assert!(!Role::Operator.requires_workspace());
        assert!(Role::WorkspaceAdmin.requires_workspace());
        assert!(Role::Manager.requires_department());
        assert!(Role::User.requires_department());
        assert!(!Role::Viewer.requires_department());
        assert!(!Role::WorkspaceAdmin.requires_department());
    }

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [
            Role::Viewer,
            Role::User,
            Role::Manager,
            Role::WorkspaceAdmin,
            Role::Operator,
        ] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("SUPERUSER".parse::<Role>().is_err());
    }

    #[test]
    fn test_rank_id_accessor() {
        let mut account = Account::default();
        assert_eq!(account.rank_id(), None);
        account.set_rank_id(Some("senior"));
        assert_eq!(account.rank_id(), Some("senior"));
        account.set_rank_id(None);
        assert_eq!(account.rank_id(), None);
    }

    #[test]
    fn test_update_input_department_tristate() {
        let absent: UpdateAccountInput = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(absent.department_id, None);

        let null: UpdateAccountInput = serde_json::from_str(r#"{"department_id":null}"#).unwrap();
        assert_eq!(null.department_id, Some(None));

        let set: UpdateAccountInput = serde_json::from_str(
            r#"{"department_id":"550e8400-e29b-41d4-a716-446655440000"}"#,
        )
        .unwrap();
        assert!(matches!(set.department_id, Some(Some(_))));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let account = Account {
            password_hash: "secret".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("password_hash"));
    }
}
