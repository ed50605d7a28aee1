//! Periodic resubmission of failed events.

use std::time::Duration;

use broker::MessagePublisher;
use chrono::{DateTime, Utc};
use event_log::{EventLog, EventLogExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::pool::PublishWorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// How old a failed event must be before it is resubmitted.
    pub threshold: chrono::Duration,
    /// Upper bound on events resubmitted per sweep.
    pub batch_limit: Option<usize>,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            threshold: chrono::Duration::hours(24),
            batch_limit: None,
        }
    }
}

/// Finds `failed` events at least `threshold` old and hands them back to
/// the publish pool, which routes each by its own event type.
pub struct RetrySweeper<L, P> {
    log: L,
    pool: PublishWorkerPool<L, P>,
    config: SweeperConfig,
}

impl<L, P> RetrySweeper<L, P>
where
    L: EventLog + 'static,
    P: MessagePublisher + 'static,
{
    pub fn new(log: L, pool: PublishWorkerPool<L, P>, config: SweeperConfig) -> Self {
        Self { log, pool, config }
    }

    /// Runs one sweep as of `now` and returns how many events were resubmitted.
    ///
    /// An event created exactly `threshold` before `now` is included.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.config.threshold;
        let stale = self.stale_pending_at(now).await?;
        metrics::gauge!("sweeper_stale_pending_events").set(stale as f64);
        if stale > 0 {
            tracing::warn!(
                stale,
                %cutoff,
                "Pending events older than the threshold are not resubmitted"
            );
        }

        let candidates = self.log.failed_before(cutoff, self.config.batch_limit).await?;
        let found = candidates.len();

        let resubmitted = candidates
            .into_iter()
            .filter(|event| self.pool.submit(event.clone()))
            .count();

        metrics::counter!("sweeper_events_resubmitted_total").increment(resubmitted as u64);
        if found > 0 {
            tracing::info!(found, resubmitted, %cutoff, "Resubmitted failed events");
        } else {
            tracing::debug!(%cutoff, "No failed events to resubmit");
        }
        Ok(resubmitted)
    }

    /// Counts `pending` events at least `threshold` old as of `now`.
    pub async fn stale_pending_at(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .log
            .pending_before(now - self.config.threshold)
            .await?
            .len())
    }

    /// Sweeps every `interval` until `cancel` fires. The first sweep runs
    /// one interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            threshold_secs = self.config.threshold.num_seconds(),
            "Retry sweeper started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_at(Utc::now()).await {
                        tracing::error!(error = %e, "Sweep failed");
                    }
                }
            }
        }
        tracing::info!("Retry sweeper stopped");
    }
}
