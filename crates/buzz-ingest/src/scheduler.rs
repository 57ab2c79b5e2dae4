//! Periodic background refresh of all active targets.

use std::time::Duration;

use buzz_core::TargetRepository;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::service::{AttentionScoreService, BatchReport, ServiceStatus};

/// Runs `update_all_targets` on a fixed period until cancelled.
///
/// Cancellation is observed between cycles and during the idle sleep. A
/// cycle that has started always runs to completion.
pub struct UpdateScheduler<R> {
    service: AttentionScoreService,
    repo: R,
    interval: Duration,
    status_tx: watch::Sender<ServiceStatus>,
}

impl<R: TargetRepository> UpdateScheduler<R> {
    pub fn new(service: AttentionScoreService, repo: R, interval: Duration) -> Self {
        let (status_tx, _) = watch::channel(service.get_service_status());
        Self {
            service,
            repo,
            interval,
            status_tx,
        }
    }

    /// Receiver that sees a fresh [`ServiceStatus`] after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<ServiceStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> ServiceStatus {
        self.service.get_service_status()
    }

    pub fn service(&self) -> &AttentionScoreService {
        &self.service
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One full pass over the active targets.
    pub async fn run_once(&mut self) -> BatchReport {
        let report = self.service.update_all_targets(&self.repo).await;
        self.publish();
        report
    }

    /// Loop until `cancel` fires. Returns the number of completed cycles.
    pub async fn run(&mut self, cancel: CancellationToken) -> u64 {
        self.service.set_running(true);
        self.publish();
        tracing::info!("scheduler started, interval {:?}", self.interval);

        let mut cycles = 0u64;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.run_once().await;
            cycles += 1;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.service.set_running(false);
        self.service.close();
        self.publish();
        tracing::info!("scheduler stopped after {cycles} cycles");
        cycles
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.service.get_service_status());
    }
}
