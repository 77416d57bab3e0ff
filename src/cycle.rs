//! The scheduled cycle: ingest, then transform.
//!
//! ```text
//! START ──► INGEST ──► TRANSFORM ──► DONE
//! ```
//!
//! An ingestion failure is logged and the cycle still transforms, since rows
//! already stored can be rewritten during a scrape outage. A transformation
//! failure ends the cycle; the next scheduled cycle retries. Cycles never
//! overlap: the scheduler awaits each one before waiting for the next tick.

use crate::error::StorageError;
use crate::ingest;
use crate::models::{IngestReport, TransformReport};
use crate::rewrite::Rewrite;
use crate::scrapers::Discover;
use crate::store::Store;
use crate::transform;
use std::time::{Duration, Instant};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Default time between cycle starts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// What happened during one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub ingest: Result<IngestReport, StorageError>,
    /// `None` when shutdown was requested before the phase started.
    pub transform: Option<Result<TransformReport, StorageError>>,
    pub elapsed: Duration,
}

/// The pipeline: a store plus its two external collaborators.
pub struct Factory<D, R> {
    store: Store,
    discoverer: D,
    rewriter: R,
    batch_limit: u32,
}

impl<D, R> Factory<D, R>
where
    D: Discover,
    R: Rewrite,
{
    pub fn new(store: Store, discoverer: D, rewriter: R, batch_limit: u32) -> Self {
        Self {
            store,
            discoverer,
            rewriter,
            batch_limit,
        }
    }

    /// Run one full cycle.
    #[instrument(level = "info", skip_all, fields(batch_limit = self.batch_limit))]
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let started = Instant::now();
        let started_at = chrono::Local::now();
        info!(%started_at, "Factory cycle started");

        let ingest = ingest::run(&self.discoverer, &self.store, cancel).await;
        if let Err(e) = &ingest {
            error!(error = %e, "Ingestion failed; continuing to transformation");
        }

        let transform = if cancel.is_cancelled() {
            warn!("Shutdown requested; skipping transformation");
            None
        } else {
            let result =
                transform::run(&self.store, &self.rewriter, self.batch_limit, cancel).await;
            if let Err(e) = &result {
                error!(error = %e, "Transformation failed; waiting for next cycle");
            }
            Some(result)
        };

        match self.store.count_by_status().await {
            Ok(counts) => info!(
                new = counts.new,
                rewritten = counts.rewritten,
                "[3/3] Store totals"
            ),
            Err(e) => warn!(error = %e, "Could not count articles"),
        }

        let elapsed = started.elapsed();
        info!(
            ?elapsed,
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "Cycle complete"
        );

        CycleReport {
            ingest,
            transform,
            elapsed,
        }
    }

    /// Run a cycle now and then once per `period` until `cancel` fires.
    ///
    /// Returns the number of cycles started.
    pub async fn run_forever(&self, period: Duration, cancel: &CancellationToken) -> usize {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0usize;

        info!(period_secs = period.as_secs(), "Factory is live");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            cycles += 1;
            self.run_cycle(cancel).await;
            info!(next_in_secs = period.as_secs(), "Waiting for next cycle");
        }

        info!(cycles, "Factory stopped");
        cycles
    }
}
