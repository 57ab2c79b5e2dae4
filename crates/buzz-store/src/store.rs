use std::env;
use std::path::{Path, PathBuf};

use buzz_core::{ScoreRecord, Source, Target, TargetRepository, now_unix_secs};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::schema;

/// Default base directory for all buzz storage.
pub fn default_base_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".buzz")
}

/// A target together with the latest score written by the ingestion engine.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSummary {
    pub target: Target,
    pub current_score: Option<f64>,
    pub current_score_at: Option<i64>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InvalidData(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::debug!("opened score store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- Targets ---

    pub fn add_target(&self, name: &str, search_term: &str) -> Result<Target> {
        let name = name.trim();
        let search_term = search_term.trim();
        if name.is_empty() || search_term.is_empty() {
            return Err(StoreError::InvalidData(
                "target name and search term must be non-empty".to_string(),
            ));
        }
        if self.find_by_name(name)?.is_some() {
            return Err(StoreError::InvalidData(format!(
                "target '{name}' already exists"
            )));
        }

        let target = Target::new(name, search_term);
        self.conn.execute(
            "INSERT INTO targets (id, name, search_term, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                target.id.to_string(),
                target.name,
                target.search_term,
                target.is_active as i32,
                now_unix_secs(),
            ],
        )?;
        Ok(target)
    }

    /// Resolve a target by UUID or by exact name.
    pub fn find_target(&self, name_or_id: &str) -> Result<Target> {
        if let Ok(id) = Uuid::parse_str(name_or_id)
            && let Some(summary) = self.load_summary(id)?
        {
            return Ok(summary.target);
        }
        self.find_by_name(name_or_id)?
            .ok_or_else(|| StoreError::NotFound(format!("target '{name_or_id}'")))
    }

    pub fn set_active(&self, target_id: Uuid, active: bool) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE targets SET is_active = ?1 WHERE id = ?2",
            params![active as i32, target_id.to_string()],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("target {target_id}")));
        }
        Ok(())
    }

    pub fn list_targets(&self) -> Result<Vec<TargetSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, search_term, is_active, current_score, current_score_at
             FROM targets ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], summary_columns)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_summary).collect()
    }

    pub fn load_summary(&self, target_id: Uuid) -> Result<Option<TargetSummary>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, search_term, is_active, current_score, current_score_at
                 FROM targets WHERE id = ?1",
                [target_id.to_string()],
                summary_columns,
            )
            .optional()?;
        row.map(into_summary).transpose()
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Target>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, search_term, is_active, current_score, current_score_at
                 FROM targets WHERE name = ?1",
                [name],
                summary_columns,
            )
            .optional()?;
        Ok(row.map(into_summary).transpose()?.map(|s| s.target))
    }

    // --- History ---

    /// Score history for a target, oldest first. `limit` keeps the most recent rows.
    pub fn history(&self, target_id: Uuid, limit: Option<usize>) -> Result<Vec<ScoreRecord>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT score, timestamp, source, confidence FROM (
                 SELECT id, score, timestamp, source, confidence FROM score_history
                 WHERE target_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2
             ) ORDER BY timestamp ASC, id ASC",
        )?;
        let rows: Vec<(f64, i64, String, f64)> = stmt
            .query_map(params![target_id.to_string(), limit], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(score, timestamp, source, confidence)| {
                Ok(ScoreRecord {
                    target_id,
                    score,
                    timestamp,
                    source: source.parse().map_err(StoreError::InvalidData)?,
                    confidence,
                })
            })
            .collect()
    }

    pub fn history_count(&self, target_id: Uuid) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM score_history WHERE target_id = ?1",
            [target_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Timestamp of the earliest recorded observation, if any.
    pub fn first_observed(&self, target_id: Uuid) -> Result<Option<i64>> {
        let first: Option<i64> = self.conn.query_row(
            "SELECT MIN(timestamp) FROM score_history WHERE target_id = ?1",
            [target_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(first)
    }
}

impl TargetRepository for Store {
    type Error = StoreError;

    fn list_active_targets(&self) -> Result<Vec<Target>> {
        Ok(self
            .list_targets()?
            .into_iter()
            .map(|s| s.target)
            .filter(|t| t.is_active)
            .collect())
    }

    fn record_score(
        &self,
        target_id: Uuid,
        score: f64,
        timestamp: i64,
        source: Source,
        confidence: f64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO score_history (target_id, score, timestamp, source, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                target_id.to_string(),
                score,
                timestamp,
                source.as_str(),
                confidence
            ],
        )?;
        Ok(())
    }

    fn update_current_score(&self, target_id: Uuid, score: f64, timestamp: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE targets SET current_score = ?1, current_score_at = ?2 WHERE id = ?3",
            params![score, timestamp, target_id.to_string()],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("target {target_id}")));
        }
        Ok(())
    }
}

type SummaryRow = (String, String, String, bool, Option<f64>, Option<i64>);

fn summary_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get::<_, i32>(3)? != 0,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_summary(row: SummaryRow) -> Result<TargetSummary> {
    let (id, name, search_term, is_active, current_score, current_score_at) = row;
    Ok(TargetSummary {
        target: Target {
            id: parse_uuid(&id)?,
            name,
            search_term,
            is_active,
        },
        current_score,
        current_score_at,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}
