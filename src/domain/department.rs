//! Department domain model and the embedded rank registry

use super::common::{Metadata, StringUuid};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A named sub-stratification of users within one department, independent of
/// global role. Rank order is display precedence only, never a permission
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rank {
    pub id: String,
    pub name: String,
    pub order: i32,
}

/// Department entity: routing target for requests. The rank list lives in
/// the metadata bag behind the typed accessors below so the uniqueness
/// invariant is enforced in one place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: StringUuid,
    pub name: String,
    pub description: Option<String>,
    pub workspace_id: StringUuid,
    #[sqlx(json)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_id: Option<StringUuid>,
    pub updated_by_id: Option<StringUuid>,
}

const RANKS_KEY: &str = "ranks";

impl Department {
    /// The ordered rank list. Malformed metadata yields an empty list rather
    /// than an error; the bag never bypasses typed invariants.
    pub fn ranks(&self) -> Vec<Rank> {
        self.metadata
            .get(RANKS_KEY)
            .and_then(|v| serde_json::from_value::<Vec<Rank>>(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn find_rank(&self, rank_id: &str) -> Option<Rank> {
        self.ranks().into_iter().find(|r| r.id == rank_id)
    }

    fn store_ranks(&mut self, mut ranks: Vec<Rank>) {
        ranks.sort_by_key(|r| r.order);
        let value = serde_json::to_value(&ranks).unwrap_or(serde_json::Value::Array(vec![]));
        self.metadata.set(RANKS_KEY, value);
    }

    /// Append a rank. Rank ids must be unique within the department.
    pub fn add_rank(&mut self, rank: Rank) -> Result<()> {
        if rank.id.trim().is_empty() {
            return Err(AppError::Validation("Rank id cannot be empty".to_string()));
        }
        let mut ranks = self.ranks();
        if ranks.iter().any(|r| r.id == rank.id) {
            return Err(AppError::Conflict(format!(
                "Rank '{}' already exists in department",
                rank.id
            )));
        }
        ranks.push(rank);
        self.store_ranks(ranks);
        Ok(())
    }

    /// Rename or reorder an existing rank.
    pub fn update_rank(&mut self, rank_id: &str, name: Option<String>, order: Option<i32>) -> Result<()> {
        let mut ranks = self.ranks();
        let rank = ranks
            .iter_mut()
            .find(|r| r.id == rank_id)
            .ok_or_else(|| AppError::NotFound(format!("Rank '{}' not found", rank_id)))?;
        if let Some(name) = name {
            rank.name = name;
        }
        if let Some(order) = order {
            rank.order = order;
        }
        self.store_ranks(ranks);
        Ok(())
    }

    pub fn remove_rank(&mut self, rank_id: &str) -> Result<()> {
        let ranks = self.ranks();
        if !ranks.iter().any(|r| r.id == rank_id) {
            return Err(AppError::NotFound(format!("Rank '{}' not found", rank_id)));
        }
        self.store_ranks(ranks.into_iter().filter(|r| r.id != rank_id).collect());
        Ok(())
    }
}

impl Default for Department {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            name: String::new(),
            description: None,
            workspace_id: StringUuid::nil(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            created_by_id: None,
            updated_by_id: None,
        }
    }
}

/// Input for creating a department
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDepartmentInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
}

/// Input for updating a department
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateDepartmentInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Input for adding or updating a rank
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RankInput {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub order: i32,
}
