//! Timeline parsing and summary statistics.
//!
//! The widget-data payload carries `default.timelineData`, a list of entries
//! shaped like `{"time": "1700000000", "value": [42], ...}`. Only the first
//! element of `value` is used; `time` arrives as a number or a numeric string
//! depending on the upstream build, so both are accepted.

use serde::{Deserialize, Deserializer, Serialize};

/// One entry of `default.timelineData` as sent by the upstream.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RawTimelineEntry {
    #[serde(default, deserialize_with = "de_values")]
    pub value: Vec<f64>,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub time: Option<i64>,
}

/// A single observation on the 0-100 upstream scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineSample {
    pub timestamp: Option<i64>,
    pub value: f64,
}

impl TimelineSample {
    pub fn at(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            value,
        }
    }
}

/// Summary statistics over a parsed timeline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub latest: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// Population standard deviation.
    pub volatility: f64,
    pub count: usize,
}

/// Convert raw entries into samples.
///
/// Entries whose first `value` element is missing or not a number are
/// skipped. When every sample carries
/// a timestamp the result is stably sorted ascending; samples sharing a
/// timestamp keep their upstream order.
pub fn parse(raw: &[RawTimelineEntry]) -> Vec<TimelineSample> {
    let mut samples: Vec<TimelineSample> = raw
        .iter()
        .filter_map(|entry| {
            let value = *entry.value.first()?;
            Some(TimelineSample {
                timestamp: entry.time,
                value,
            })
        })
        .collect();

    if samples.iter().all(|s| s.timestamp.is_some()) {
        samples.sort_by_key(|s| s.timestamp);
    }
    samples
}

/// Compute summary statistics. Returns `None` for an empty timeline.
///
/// The median is the element at index `n / 2` of the value-sorted sequence,
/// with no averaging of the two middle values for even counts.
pub fn aggregate(samples: &[TimelineSample]) -> Option<Aggregates> {
    let last = samples.last()?;
    let n = samples.len();
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();

    let average = values.iter().sum::<f64>() / n as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);
    let median = sorted[n / 2];

    let volatility = if n < 2 {
        0.0
    } else {
        let variance = values.iter().map(|v| (v - average).powi(2)).sum::<f64>() / n as f64;
        variance.sqrt()
    };

    Some(Aggregates {
        latest: last.value,
        average,
        min,
        max,
        median,
        volatility,
        count: n,
    })
}

fn de_values<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    // Stop at the first non-numeric element so `value[0]` is never replaced
    // by a later number.
    Ok(raw
        .unwrap_or_default()
        .iter()
        .map_while(serde_json::Value::as_f64)
        .collect())
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
