//! Synthetic scores for when the live pipeline cannot produce one.
//!
//! Never fails and never touches the network. The base score comes from a
//! small table of category baselines (political figures, business figures,
//! nations, financial instruments); unknown terms draw a uniform base in
//! [20, 60]. A uniform jitter of +/-10 is added and the result clamped to
//! [0, 100].

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

use crate::constants::{FALLBACK_JITTER, FALLBACK_UNKNOWN_MAX, FALLBACK_UNKNOWN_MIN};
use crate::score::{ScoreResult, Source, clamp_score};
use crate::timeframe::Timeframe;
use crate::timeline::{Aggregates, TimelineSample};

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Trailing qualifiers that do not change which entity a term refers to.
const STRIPPED_SUFFIXES: &[&str] = &[" news", " stock", " price", " today", " crypto"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Political,
    Business,
    Nation,
    Financial,
}

const BASELINES: &[(&str, Category, f64)] = &[
    ("donald trump", Category::Political, 85.0),
    ("trump", Category::Political, 85.0),
    ("joe biden", Category::Political, 70.0),
    ("biden", Category::Political, 70.0),
    ("kamala harris", Category::Political, 60.0),
    ("vladimir putin", Category::Political, 65.0),
    ("elon musk", Category::Business, 80.0),
    ("jeff bezos", Category::Business, 50.0),
    ("mark zuckerberg", Category::Business, 55.0),
    ("tesla", Category::Business, 65.0),
    ("apple", Category::Business, 70.0),
    ("united states", Category::Nation, 60.0),
    ("china", Category::Nation, 65.0),
    ("russia", Category::Nation, 60.0),
    ("ukraine", Category::Nation, 55.0),
    ("israel", Category::Nation, 60.0),
    ("bitcoin", Category::Financial, 75.0),
    ("ethereum", Category::Financial, 55.0),
    ("dogecoin", Category::Financial, 40.0),
    ("s&p 500", Category::Financial, 45.0),
    ("gold", Category::Financial, 50.0),
];

/// Lower-case, strip punctuation, collapse whitespace and drop trailing
/// qualifiers such as " news" or " stock".
pub fn normalize_term(term: &str) -> String {
    let lowered = term.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, " ");
    let mut normalized = WHITESPACE.replace_all(cleaned.trim(), " ").into_owned();

    while let Some(stripped) = STRIPPED_SUFFIXES
        .iter()
        .find_map(|suffix| normalized.strip_suffix(*suffix))
    {
        normalized = stripped.trim_end().to_string();
    }
    normalized
}

/// Known baseline for a term, if it belongs to one of the seeded categories.
pub fn baseline(term: &str) -> Option<(Category, f64)> {
    let lowered = term.to_lowercase();
    let normalized = normalize_term(term);
    BASELINES
        .iter()
        .find(|(name, _, _)| *name == normalized || *name == lowered.trim())
        .map(|(_, category, base)| (*category, *base))
}

pub struct FallbackGenerator;

impl FallbackGenerator {
    /// Produce a synthetic score for `term`.
    pub fn generate(
        term: &str,
        geo: &str,
        timeframe: Timeframe,
        now: i64,
        rng: &mut impl Rng,
    ) -> ScoreResult {
        let base = match baseline(term) {
            Some((_, base)) => base,
            None => rng.random_range(FALLBACK_UNKNOWN_MIN..=FALLBACK_UNKNOWN_MAX),
        };
        let jitter = rng.random_range(-FALLBACK_JITTER..=FALLBACK_JITTER);
        let score = clamp_score(base + jitter);

        ScoreResult {
            success: true,
            term: term.to_string(),
            geo: geo.to_string(),
            timeframe,
            attention_score: score,
            timeline: vec![TimelineSample::at(now, score)],
            aggregates: Aggregates {
                latest: score,
                average: score,
                min: score,
                max: score,
                median: score,
                volatility: 0.0,
                count: 1,
            },
            source: Source::Fallback,
            fetched_at: now,
            error: None,
        }
    }
}
