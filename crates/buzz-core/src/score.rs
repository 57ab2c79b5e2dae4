use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SCORE, MIN_SCORE};
use crate::timeframe::Timeframe;
use crate::timeline::{Aggregates, TimelineSample, aggregate};

/// Where a score came from. Always carried on the result so consumers can
/// tell a live observation from a synthetic one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Live,
    Cache,
    Fallback,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Live => "live",
            Source::Cache => "cache",
            Source::Fallback => "fallback",
        }
    }

    /// Confidence recorded alongside a score in the history table.
    pub fn confidence(self) -> f64 {
        match self {
            Source::Live => 1.0,
            Source::Cache => 0.9,
            Source::Fallback => 0.2,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Source::Live),
            "cache" => Ok(Source::Cache),
            "fallback" => Ok(Source::Fallback),
            other => Err(format!("unknown score source '{other}'")),
        }
    }
}

/// The public result of one attention-score lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub success: bool,
    pub term: String,
    pub geo: String,
    pub timeframe: Timeframe,
    /// Latest sample value, clamped to the 0-100 scale.
    pub attention_score: f64,
    pub timeline: Vec<TimelineSample>,
    pub aggregates: Aggregates,
    pub source: Source,
    pub fetched_at: i64,
    pub error: Option<String>,
}

impl ScoreResult {
    /// Build a successful result from a non-empty timeline.
    /// Returns `None` when the timeline has no samples.
    pub fn from_timeline(
        term: &str,
        geo: &str,
        timeframe: Timeframe,
        timeline: Vec<TimelineSample>,
        source: Source,
        fetched_at: i64,
    ) -> Option<Self> {
        let aggregates = aggregate(&timeline)?;
        Some(Self {
            success: true,
            term: term.to_string(),
            geo: geo.to_string(),
            timeframe,
            attention_score: clamp_score(aggregates.latest),
            timeline,
            aggregates,
            source,
            fetched_at,
            error: None,
        })
    }

    /// Same observation, re-tagged with a different source.
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn confidence(&self) -> f64 {
        self.source.confidence()
    }
}

/// Clamp a value onto the 0-100 scale. NaN maps to the floor.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_SCORE;
    }
    value.clamp(MIN_SCORE, MAX_SCORE)
}
