use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::score::Source;

/// A tracked entity. Owned by the storage layer; the ingestion engine only
/// reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub name: String,
    pub search_term: String,
    pub is_active: bool,
}

impl Target {
    pub fn new(name: &str, search_term: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            search_term: search_term.to_string(),
            is_active: true,
        }
    }
}

/// One row of score history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub target_id: Uuid,
    pub score: f64,
    pub timestamp: i64,
    pub source: Source,
    pub confidence: f64,
}

/// The storage collaborator the ingestion engine reads targets from and
/// writes observations to.
pub trait TargetRepository {
    type Error: std::error::Error + Send + Sync + 'static;

    fn list_active_targets(&self) -> Result<Vec<Target>, Self::Error>;

    /// Append one observation. Never deduplicates: two calls with identical
    /// arguments produce two history rows.
    fn record_score(
        &self,
        target_id: Uuid,
        score: f64,
        timestamp: i64,
        source: Source,
        confidence: f64,
    ) -> Result<(), Self::Error>;

    fn update_current_score(&self, target_id: Uuid, score: f64, timestamp: i64)
    -> Result<(), Self::Error>;
}
