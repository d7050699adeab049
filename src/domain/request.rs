//! Work request (ticket) domain model and its status state machine

use super::common::{Metadata, StringUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Request lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    New,
    Assigned,
    InProcess,
    Pending,
    Done,
}

impl RequestStatus {
    /// Statuses reachable from `self` under the explicit transition graph.
    /// `assign`/`unassign` force Assigned/New and bypass this table.
    pub fn allowed_transitions(&self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            New => &[Assigned],
            Assigned => &[InProcess, New],
            InProcess => &[Pending, Done],
            Pending => &[Done, InProcess],
            Done => &[],
        }
    }

    pub fn can_transition_to(&self, target: RequestStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(RequestStatus::New),
            "assigned" => Ok(RequestStatus::Assigned),
            "in_process" => Ok(RequestStatus::InProcess),
            "pending" => Ok(RequestStatus::Pending),
            "done" => Ok(RequestStatus::Done),
            _ => Err(format!("Unknown request status: {}", s)),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::New => write!(f, "new"),
            RequestStatus::Assigned => write!(f, "assigned"),
            RequestStatus::InProcess => write!(f, "in_process"),
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Done => write!(f, "done"),
        }
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for RequestStatus {
    fn decode(
        value: sqlx::mysql::MySqlValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let s: String = sqlx::Decode::<'r, sqlx::MySql>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl sqlx::Type<sqlx::MySql> for RequestStatus {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for RequestStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// Request priority; informational only, no lifecycle logic keys off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::str::FromStr for RequestPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RequestPriority::Low),
            "medium" => Ok(RequestPriority::Medium),
            "high" => Ok(RequestPriority::High),
            "critical" => Ok(RequestPriority::Critical),
            _ => Err(format!("Unknown request priority: {}", s)),
        }
    }
}

impl std::fmt::Display for RequestPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestPriority::Low => write!(f, "low"),
            RequestPriority::Medium => write!(f, "medium"),
            RequestPriority::High => write!(f, "high"),
            RequestPriority::Critical => write!(f, "critical"),
        }
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for RequestPriority {
    fn decode(
        value: sqlx::mysql::MySqlValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let s: String = sqlx::Decode::<'r, sqlx::MySql>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl sqlx::Type<sqlx::MySql> for RequestPriority {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for RequestPriority {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// Work request entity. `workspace_id` and `department_id` are immutable
/// after creation; no update path touches them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkRequest {
    pub id: StringUuid,
    pub title: String,
    pub description: Option<String>,
    pub status: RequestStatus,
    pub priority: RequestPriority,
    pub department_id: StringUuid,
    pub assignee_id: Option<StringUuid>,
    pub creator_id: Option<StringUuid>,
    pub workspace_id: StringUuid,
    #[sqlx(json)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_id: Option<StringUuid>,
    pub updated_by_id: Option<StringUuid>,
}

const DONE_AT_KEY: &str = "done_at";
const RECORD_ID_KEY: &str = "record_id";
const TEMPLATE_ID_KEY: &str = "template_id";

impl WorkRequest {
    /// Completion timestamp; present only while status is Done.
    pub fn done_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get_str(DONE_AT_KEY)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn stamp_done_at(&mut self, at: DateTime<Utc>) {
        self.metadata.set_str(DONE_AT_KEY, &at.to_rfc3339());
    }

    pub fn clear_done_at(&mut self) {
        self.metadata.remove(DONE_AT_KEY);
    }

    /// Back-reference to a linked form submission, if any.
    pub fn linked_record_id(&self) -> Option<StringUuid> {
        self.metadata
            .get_str(RECORD_ID_KEY)
            .and_then(|s| StringUuid::parse_str(s).ok())
    }

    pub fn link_record(&mut self, template_id: StringUuid, record_id: StringUuid) {
        self.metadata.set_str(TEMPLATE_ID_KEY, &template_id.to_string());
        self.metadata.set_str(RECORD_ID_KEY, &record_id.to_string());
    }
}

impl Default for WorkRequest {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            title: String::new(),
            description: None,
            status: RequestStatus::New,
            priority: RequestPriority::Medium,
            department_id: StringUuid::nil(),
            assignee_id: None,
            creator_id: None,
            workspace_id: StringUuid::nil(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            created_by_id: None,
            updated_by_id: None,
        }
    }
}

/// Input for creating a request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRequestInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: RequestPriority,
    pub department_id: StringUuid,
}

/// Input for updating a request's editable fields
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRequestInput {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<RequestPriority>,
    pub department_id: Option<StringUuid>,
}

/// Optional list filters for request queries
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RequestFilter {
    pub department_id: Option<StringUuid>,
    pub assignee_id: Option<StringUuid>,
    /// `Some(false)` keeps live requests, `Some(true)` the Done backlog.
    pub done: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RequestStatus::New, RequestStatus::Assigned, true)]
    #[case(RequestStatus::New, RequestStatus::Done, false)]
    #[case(RequestStatus::Assigned, RequestStatus::InProcess, true)]
    #[case(RequestStatus::Assigned, RequestStatus::New, true)]
    #[case(RequestStatus::InProcess, RequestStatus::Pending, true)]
    #[case(RequestStatus::InProcess, RequestStatus::Done, true)]
    #[case(RequestStatus::Pending, RequestStatus::Done, true)]
    #[case(RequestStatus::Pending, RequestStatus::InProcess, true)]
    #[case(RequestStatus::Done, RequestStatus::New, false)]
    #[case(RequestStatus::Done, RequestStatus::InProcess, false)]
    fn test_transition_graph(
        #[case] from: RequestStatus,
        #[case] to: RequestStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            "IN_PROCESS".parse::<RequestStatus>().unwrap(),
            RequestStatus::InProcess
        );
        assert!("in-process".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_done_at_roundtrip() {
        let mut req = WorkRequest::default();
        assert!(req.done_at().is_none());

        let now = Utc::now();
        req.stamp_done_at(now);
        let read = req.done_at().unwrap();
        assert_eq!(read.timestamp(), now.timestamp());

        req.clear_done_at();
        assert!(req.done_at().is_none());
    }

    #[test]
    fn test_record_link_accessor() {
        let mut req = WorkRequest::default();
        assert!(req.linked_record_id().is_none());

        let template_id = StringUuid::new_v4();
        let record_id = StringUuid::new_v4();
        req.link_record(template_id, record_id);
        assert_eq!(req.linked_record_id(), Some(record_id));
        assert_eq!(
            req.metadata.get_str("template_id"),
            Some(template_id.to_string().as_str())
        );
    }
}
