//! REST API handlers and shared response types

pub mod accounts;
pub mod audit;
pub mod auth;
pub mod forms;
pub mod health;
pub mod workflow;
pub mod workspaces;

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::domain::StringUuid;

/// Pagination query parameters. The effective page size comes from
/// [`PaginationQuery::per_page`], which applies the configured default and
/// ceiling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page", deserialize_with = "deserialize_page")]
    pub page: i64,
    #[serde(default, deserialize_with = "deserialize_per_page", alias = "limit")]
    pub per_page: Option<i64>,
}

impl PaginationQuery {
    pub fn per_page(&self, config: &PaginationConfig) -> i64 {
        self.per_page
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size)
    }

    pub fn offset(&self, per_page: i64) -> i64 {
        (self.page - 1) * per_page
    }
}

pub(crate) fn default_page() -> i64 {
    1
}

/// Zero or negative page values clamp to the first page.
pub(crate) fn deserialize_page<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(value.max(1))
}

/// Zero or negative sizes clamp to 1; the ceiling is applied in
/// [`PaginationQuery::per_page`].
pub(crate) fn deserialize_per_page<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.map(|v| v.max(1)))
}

/// Query parameter naming the workspace a call operates on. Optional: most
/// callers rely on the ambient workspace instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceQuery {
    pub workspace_id: Option<StringUuid>,
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = (total as f64 / per_page as f64).ceil() as i64;
        Self {
            data,
            pagination: PaginationMeta {
                page,
                per_page,
                total,
                total_pages,
            },
        }
    }
}

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Message response (for delete, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
