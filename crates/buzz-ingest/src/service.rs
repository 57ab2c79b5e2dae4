//! Attention score orchestration.
//!
//! One lookup walks `CacheCheck -> Negotiate -> Fetch -> Parse -> CacheWrite ->
//! Return`. Any failure after the cache check moves to `Fallback`, which
//! cannot fail, so [`AttentionScoreService::get_attention_score`] always
//! returns a result. The `source` field on that result is the only signal
//! that upstream data was unavailable.

use std::sync::Arc;

use buzz_core::{
    CacheKey, CacheStore, FallbackGenerator, ScoreResult, Source, Target, TargetRepository,
    Timeframe, now_unix_secs, parse,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::IngestConfig;
use crate::error::{ConfigError, FetchError};
use crate::protocol::{ProtocolClient, RegionScore};

/// Cache handle shared between service instances in one process.
pub type SharedCache = Arc<Mutex<CacheStore>>;

/// Position in the per-request state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    CacheCheck,
    Negotiate,
    Fetch,
    Parse,
    CacheWrite,
    Return,
    Fallback,
}

/// A live-path failure and the stage it happened in.
#[derive(Debug)]
struct Failure {
    stage: Stage,
    error: FetchError,
}

impl Failure {
    fn at(stage: Stage) -> impl FnOnce(FetchError) -> Self {
        move |error| Self { stage, error }
    }
}

/// Outcome counts for one `update_all_targets` pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Targets whose score was persisted.
    pub updated: usize,
    /// Targets whose score could not be persisted.
    pub failed: usize,
    pub live: usize,
    pub cached: usize,
    pub fallback: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    /// Unix seconds of the last completed batch.
    pub last_update: Option<i64>,
    pub cycle_count: u64,
    pub error_count: u64,
}

pub struct AttentionScoreService {
    client: ProtocolClient,
    cache: SharedCache,
    rng: SmallRng,
    config: IngestConfig,
    status: ServiceStatus,
}

impl AttentionScoreService {
    pub fn new(config: IngestConfig) -> Result<Self, ConfigError> {
        let cache = Arc::new(Mutex::new(CacheStore::new(config.cache_ttl())));
        Self::with_cache(config, cache)
    }

    /// Build a service that reads and writes an existing cache.
    pub fn with_cache(config: IngestConfig, cache: SharedCache) -> Result<Self, ConfigError> {
        Ok(Self {
            client: ProtocolClient::new(&config)?,
            cache,
            rng: SmallRng::from_os_rng(),
            config,
            status: ServiceStatus::default(),
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn client(&self) -> &ProtocolClient {
        &self.client
    }

    pub fn cache(&self) -> SharedCache {
        Arc::clone(&self.cache)
    }

    pub fn get_service_status(&self) -> ServiceStatus {
        self.status.clone()
    }

    pub fn set_running(&mut self, running: bool) {
        self.status.running = running;
    }

    /// Release the upstream session.
    pub fn close(&mut self) {
        self.client.close();
    }

    /// Current attention score for `term`. Never fails.
    pub async fn get_attention_score(
        &mut self,
        term: &str,
        geo: &str,
        timeframe: Timeframe,
    ) -> ScoreResult {
        let term = term.trim();
        let key = CacheKey::new(term, timeframe, geo, &self.config.locale);

        enter(term, Stage::CacheCheck);
        if let Some(entry) = self.cache.lock().await.get(&key) {
            tracing::debug!(term, geo, %timeframe, "cache hit");
            enter(term, Stage::Return);
            return entry.result.clone().with_source(Source::Cache);
        }

        match self.fetch_live(term, geo, timeframe).await {
            Ok(result) => {
                enter(term, Stage::CacheWrite);
                self.cache.lock().await.put(key, result.clone());
                tracing::info!(
                    term,
                    score = result.attention_score,
                    samples = result.aggregates.count,
                    "live score"
                );
                enter(term, Stage::Return);
                result
            }
            Err(failure) => {
                tracing::warn!(
                    term,
                    stage = ?failure.stage,
                    kind = ?failure.error.kind(),
                    "live fetch failed, using fallback: {}",
                    failure.error
                );
                enter(term, Stage::Fallback);
                FallbackGenerator::generate(term, geo, timeframe, now_unix_secs(), &mut self.rng)
            }
        }
    }

    async fn fetch_live(
        &mut self,
        term: &str,
        geo: &str,
        timeframe: Timeframe,
    ) -> Result<ScoreResult, Failure> {
        enter(term, Stage::Negotiate);
        let widgets = self
            .client
            .negotiate_tokens(&[term], timeframe, geo, &self.config.locale)
            .await
            .map_err(Failure::at(Stage::Negotiate))?;

        enter(term, Stage::Fetch);
        let raw = self
            .client
            .fetch_timeseries(&widgets.timeseries)
            .await
            .map_err(Failure::at(Stage::Fetch))?;

        enter(term, Stage::Parse);
        let samples = parse(&raw);
        ScoreResult::from_timeline(term, geo, timeframe, samples, Source::Live, now_unix_secs())
            .ok_or_else(|| Failure {
                stage: Stage::Parse,
                error: FetchError::EmptyTimeline {
                    term: term.to_string(),
                },
            })
    }

    /// Per-region interest for `term`. Upstream failures yield an empty list.
    pub async fn get_region_breakdown(
        &mut self,
        term: &str,
        geo: &str,
        timeframe: Timeframe,
    ) -> Vec<RegionScore> {
        let term = term.trim();
        let widgets = match self
            .client
            .negotiate_tokens(&[term], timeframe, geo, &self.config.locale)
            .await
        {
            Ok(widgets) => widgets,
            Err(e) => {
                tracing::warn!(term, "region breakdown unavailable: {e}");
                return Vec::new();
            }
        };
        let Some(widget) = widgets.geo_map else {
            tracing::debug!(term, "no geo-map widget offered");
            return Vec::new();
        };
        match self.client.fetch_region_breakdown(&widget).await {
            Ok(regions) => regions,
            Err(e) => {
                tracing::warn!(term, "region breakdown unavailable: {e}");
                Vec::new()
            }
        }
    }

    /// Score every active target once, strictly one at a time, persisting
    /// each observation. A failure on one target never stops the batch.
    pub async fn update_all_targets<R: TargetRepository>(&mut self, repo: &R) -> BatchReport {
        let mut report = BatchReport::default();
        let targets = match repo.list_active_targets() {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!("failed to list active targets: {e}");
                self.status.error_count += 1;
                return report;
            }
        };

        tracing::info!("updating {} active targets", targets.len());
        let geo = self.config.default_geo.clone();
        let timeframe = self.config.default_timeframe;
        let delay = self.config.inter_target_delay();

        for (index, target) in targets.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result = self
                .get_attention_score(&target.search_term, &geo, timeframe)
                .await;
            match result.source {
                Source::Live => report.live += 1,
                Source::Cache => report.cached += 1,
                Source::Fallback => report.fallback += 1,
            }

            match persist(repo, target, &result) {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    tracing::error!(name = %target.name, "failed to persist score: {e}");
                    report.failed += 1;
                }
            }
        }

        self.status.cycle_count += 1;
        self.status.last_update = Some(now_unix_secs());
        self.status.error_count += report.failed as u64;
        tracing::info!(
            updated = report.updated,
            failed = report.failed,
            live = report.live,
            cached = report.cached,
            fallback = report.fallback,
            "batch complete"
        );
        report
    }
}

fn enter(term: &str, stage: Stage) {
    tracing::trace!(term, ?stage, "score lookup");
}

fn persist<R: TargetRepository>(
    repo: &R,
    target: &Target,
    result: &ScoreResult,
) -> Result<(), R::Error> {
    let observed_at = now_unix_secs();
    repo.record_score(
        target.id,
        result.attention_score,
        observed_at,
        result.source,
        result.confidence(),
    )?;
    repo.update_current_score(target.id, result.attention_score, observed_at)
}
