//! Forward-fill interpolation onto a fixed time grid.
//!
//! Each grid point carries the most recent real sample at or before it.
//! Grid points preceding the first real sample take the first sample's value
//! (backward fill happens only at the very start). Every emitted point keeps
//! the timestamp of the real sample it was derived from.

use serde::{Deserialize, Serialize};

use crate::timeline::TimelineSample;

/// Upper bound on the up-front allocation for one series.
const MAX_PREALLOCATED_POINTS: usize = 1 << 16;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DensePoint {
    pub timestamp: i64,
    pub value: f64,
    /// Timestamp of the real sample this value was carried from.
    pub source_timestamp: i64,
    /// True when the grid point does not coincide with a real sample.
    pub filled: bool,
}

/// Walk the grid `window_start, window_start + step, ..` up to and including
/// `window_end`, emitting one carried-forward point per step.
///
/// Samples without a timestamp cannot be placed on the grid and are ignored.
/// An empty sample set, a non-positive step or an inverted window all yield
/// an empty series.
pub fn densify(
    samples: &[TimelineSample],
    grid_step: i64,
    window_start: i64,
    window_end: i64,
) -> Vec<DensePoint> {
    let mut timed: Vec<(i64, f64)> = samples
        .iter()
        .filter_map(|s| s.timestamp.map(|ts| (ts, s.value)))
        .collect();
    if timed.is_empty() || grid_step <= 0 || window_end < window_start {
        return Vec::new();
    }
    timed.sort_by_key(|(ts, _)| *ts);

    let capacity = window_end
        .checked_sub(window_start)
        .and_then(|span| span.checked_div(grid_step))
        .and_then(|steps| usize::try_from(steps).ok())
        .map_or(MAX_PREALLOCATED_POINTS, |steps| {
            steps.saturating_add(1).min(MAX_PREALLOCATED_POINTS)
        });
    let mut points = Vec::with_capacity(capacity);
    let mut current = timed[0];
    let mut next = 0usize;

    let mut t = window_start;
    while t <= window_end {
        // Duplicated timestamps resolve to the last one in sample order.
        while next < timed.len() && timed[next].0 <= t {
            current = timed[next];
            next += 1;
        }
        points.push(DensePoint {
            timestamp: t,
            value: current.1,
            source_timestamp: current.0,
            filled: current.0 != t,
        });
        match t.checked_add(grid_step) {
            Some(n) => t = n,
            None => break,
        }
    }
    points
}

/// Per-target forward-fill window: from the first observed sample (but no
/// further back than `max_window_secs`) up to `now`.
pub fn history_window(first_observed: i64, now: i64, max_window_secs: i64) -> (i64, i64) {
    let earliest = now - max_window_secs.max(0);
    (first_observed.max(earliest).min(now), now)
}
