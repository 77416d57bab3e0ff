//! Merge discovered articles into the store.
//!
//! Discovery failures are logged and treated as an empty pass. Titles already
//! stored are skipped silently, which makes ingesting the same candidates
//! twice leave the store exactly as ingesting them once.

use crate::error::StorageError;
use crate::models::{Candidate, IngestReport};
use crate::scrapers::Discover;
use crate::store::Store;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Run discovery and store every candidate whose title is new.
///
/// Returns early with an empty report when discovery fails or shutdown is
/// requested before discovery finishes. Fails only when the store does.
#[instrument(level = "info", skip_all)]
pub async fn run<D: Discover>(
    discoverer: &D,
    store: &Store,
    cancel: &CancellationToken,
) -> Result<IngestReport, StorageError> {
    info!("[1/3] Scraping news...");

    let discovered = tokio::select! {
        biased;
        result = discoverer.discover() => result,
        _ = cancel.cancelled() => {
            warn!("Shutdown requested during discovery; nothing ingested");
            return Ok(IngestReport::default());
        }
    };

    match discovered {
        Ok(candidates) => merge(store, candidates).await,
        Err(e) => {
            error!(error = %e, "Scraper error; continuing with zero new articles");
            Ok(IngestReport {
                discovery_failed: true,
                ..IngestReport::default()
            })
        }
    }
}

/// Insert each candidate unless its title is already stored.
pub async fn merge(
    store: &Store,
    candidates: Vec<Candidate>,
) -> Result<IngestReport, StorageError> {
    let mut report = IngestReport {
        discovered: candidates.len(),
        ..IngestReport::default()
    };

    for candidate in candidates {
        if store
            .insert_if_absent(&candidate.title, &candidate.link, &candidate.body)
            .await?
        {
            report.inserted += 1;
        } else {
            debug!(title = %candidate.title, "Already stored; skipping");
            report.skipped += 1;
        }
    }

    info!(
        discovered = report.discovered,
        inserted = report.inserted,
        skipped = report.skipped,
        "Database updated with full article bodies"
    );
    Ok(report)
}
