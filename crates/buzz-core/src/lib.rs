//! Attention score domain logic.
//!
//! Turns raw upstream timeline entries into ordered samples and aggregates,
//! caches results with a TTL, synthesizes fallback scores, and forward-fills
//! sparse series onto a fixed grid.
//!
//! Zero network I/O: transport lives in `buzz-ingest`, persistence in
//! `buzz-store`.

pub mod cache;
pub mod constants;
pub mod fallback;
pub mod interpolate;
pub mod score;
pub mod target;
pub mod time;
pub mod timeframe;
pub mod timeline;

pub use cache::{CacheEntry, CacheKey, CacheStore};
pub use constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_GRID_STEP_SECS, MAX_SCORE, MIN_SCORE};
pub use fallback::{Category, FallbackGenerator, baseline, normalize_term};
pub use interpolate::{DensePoint, densify, history_window};
pub use score::{ScoreResult, Source, clamp_score};
pub use target::{ScoreRecord, Target, TargetRepository};
pub use time::{floor_to_step, now_unix_secs, unix_to_iso8601};
pub use timeframe::Timeframe;
pub use timeline::{Aggregates, RawTimelineEntry, TimelineSample, aggregate, parse};
