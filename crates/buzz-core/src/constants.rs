/// Floor of the upstream attention scale
pub const MIN_SCORE: f64 = 0.0;

/// Ceiling of the upstream attention scale
pub const MAX_SCORE: f64 = 100.0;

/// Cache entries older than this are treated as absent (60 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

/// Fallback: base range for terms with no known category baseline
pub const FALLBACK_UNKNOWN_MIN: f64 = 20.0;
pub const FALLBACK_UNKNOWN_MAX: f64 = 60.0;

/// Fallback: symmetric jitter applied on top of the base score
pub const FALLBACK_JITTER: f64 = 10.0;

/// Forward-fill: default grid step (5 minutes)
pub const DEFAULT_GRID_STEP_SECS: i64 = 5 * 60;
