//! Rewrite a bounded batch of `new` articles and promote each success.
//!
//! Rows are processed one at a time. A failed or empty rewrite leaves its row
//! `new` for a later cycle and never stops the rest of the batch. Shutdown is
//! honored between rows, never in the middle of a promotion.
//!
//! # Concurrent workers
//!
//! Rows are not claimed before the batch is selected. Two workers sharing a
//! database can both select and rewrite the same row, paying for the rewrite
//! twice. Only one of them can promote it: promotion is a compare-and-set on
//! `status = 'new'`, so the loser sees `promote_to_rewritten` return `false`
//! and counts the row as [`TransformReport::lost`] instead of overwriting the
//! winner.

use crate::error::StorageError;
use crate::models::TransformReport;
use crate::rewrite::Rewrite;
use crate::store::Store;
use crate::utils::truncate_for_log;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Default number of rows rewritten per cycle.
pub const DEFAULT_BATCH_LIMIT: u32 = 10;

/// Rewrite up to `batch_limit` pending rows, most recent first.
///
/// Fails only when the store does; rewrite failures are counted per row.
#[instrument(level = "info", skip(store, rewriter, cancel))]
pub async fn run<R: Rewrite>(
    store: &Store,
    rewriter: &R,
    batch_limit: u32,
    cancel: &CancellationToken,
) -> Result<TransformReport, StorageError> {
    let batch = store.select_pending(batch_limit).await?;

    if batch.is_empty() {
        info!("[!] No new articles found. Everything is already processed.");
        return Ok(TransformReport::default());
    }

    let mut report = TransformReport {
        selected: batch.len(),
        ..TransformReport::default()
    };
    info!(count = batch.len(), "[2/3] Processing fresh articles...");

    for (i, article) in batch.into_iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(
                remaining = report.selected - i,
                "Shutdown requested; leaving remaining articles for next cycle"
            );
            report.cancelled = true;
            break;
        }

        info!(
            id = article.id,
            title = %truncate_for_log(&article.title, 50),
            "[*] AI rewriting"
        );

        let rewritten = match rewriter.rewrite(&article.body).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(id = article.id, "AI returned empty text; article stays new");
                report.failed += 1;
                continue;
            }
            Err(e) => {
                warn!(id = article.id, error = %e, "AI failed for article; article stays new");
                report.failed += 1;
                continue;
            }
        };

        if store.promote_to_rewritten(article.id, &rewritten).await? {
            info!(id = article.id, "Successfully transformed");
            report.rewritten += 1;
        } else {
            warn!(id = article.id, "Article was no longer new; promotion skipped");
            report.lost += 1;
        }
    }

    info!(
        selected = report.selected,
        processed = report.processed(),
        rewritten = report.rewritten,
        failed = report.failed,
        lost = report.lost,
        cancelled = report.cancelled,
        "Transformation pass complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RewriteError;
    use crate::models::{ArticleStatus, StatusCounts};
    use std::cell::{Cell, RefCell};

    /// Rewrites by prefixing, failing for bodies listed in `fail_on`.
    struct Prefixing {
        fail_on: Vec<String>,
        seen: RefCell<Vec<String>>,
    }

    impl Prefixing {
        fn failing_on(bodies: &[&str]) -> Self {
            Self {
                fail_on: bodies.iter().map(|b| b.to_string()).collect(),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Rewrite for Prefixing {
        async fn rewrite(&self, body: &str) -> Result<String, RewriteError> {
            self.seen.borrow_mut().push(body.to_string());
            if self.fail_on.iter().any(|b| b == body) {
                Err(RewriteError::Api("model overloaded".to_string()))
            } else {
                Ok(format!("rewritten: {body}"))
            }
        }
    }

    /// Answers with whitespace only.
    struct Blank;

    impl Rewrite for Blank {
        async fn rewrite(&self, _body: &str) -> Result<String, RewriteError> {
            Ok("   ".to_string())
        }
    }

    /// Cancels the token after its first answer.
    struct CancelsAfterFirst {
        cancel: CancellationToken,
        calls: Cell<usize>,
    }

    impl Rewrite for CancelsAfterFirst {
        async fn rewrite(&self, body: &str) -> Result<String, RewriteError> {
            self.calls.set(self.calls.get() + 1);
            self.cancel.cancel();
            Ok(format!("rewritten: {body}"))
        }
    }

    /// Promotes the row itself before answering, as a competing worker would.
    struct Racing {
        store: Store,
    }

    impl Rewrite for Racing {
        async fn rewrite(&self, body: &str) -> Result<String, RewriteError> {
            let pending = self.store.select_pending(1).await.unwrap();
            self.store
                .promote_to_rewritten(pending[0].id, "other worker")
                .await
                .unwrap();
            Ok(format!("rewritten: {body}"))
        }
    }

    async fn seeded(count: usize) -> Store {
        let store = Store::in_memory().await.unwrap();
        for i in 1..=count {
            store
                .insert_if_absent(
                    &format!("Headline {i}"),
                    "https://lite.cnn.com",
                    &format!("body {i}"),
                )
                .await
                .unwrap();
        }
        store
    }

    async fn status_of(store: &Store, id: i64) -> ArticleStatus {
        store.fetch(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_per_row_failure_is_isolated() {
        let store = seeded(3).await;
        let rewriter = Prefixing::failing_on(&["body 2"]);

        let report = run(&store, &rewriter, DEFAULT_BATCH_LIMIT, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.selected, 3);
        assert_eq!(report.rewritten, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(status_of(&store, 1).await, ArticleStatus::Rewritten);
        assert_eq!(status_of(&store, 2).await, ArticleStatus::New);
        assert_eq!(status_of(&store, 3).await, ArticleStatus::Rewritten);

        let failed = store.fetch(2).await.unwrap().unwrap();
        assert_eq!(failed.body, "body 2");
        let done = store.fetch(3).await.unwrap().unwrap();
        assert_eq!(done.body, "rewritten: body 3");
    }

    #[tokio::test]
    async fn test_batch_is_bounded_to_most_recent_rows() {
        let store = seeded(15).await;
        let rewriter = Prefixing::failing_on(&[]);

        let report = run(&store, &rewriter, 10, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.rewritten, 10);

        let expected: Vec<String> = (6..=15).rev().map(|i| format!("body {i}")).collect();
        assert_eq!(*rewriter.seen.borrow(), expected);

        let remaining: Vec<i64> = store
            .select_pending(100)
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(remaining, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_promoted_rows_are_not_selected_again() {
        let store = seeded(3).await;
        let rewriter = Prefixing::failing_on(&[]);
        let cancel = CancellationToken::new();

        run(&store, &rewriter, 10, &cancel).await.unwrap();
        assert!(store.select_pending(10).await.unwrap().is_empty());

        let second = run(&store, &rewriter, 10, &cancel).await.unwrap();
        assert_eq!(second, TransformReport::default());
        assert_eq!(rewriter.seen.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_store_is_a_no_op() {
        let store = Store::in_memory().await.unwrap();
        let rewriter = Prefixing::failing_on(&[]);

        let report = run(&store, &rewriter, 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.processed(), 0);
        assert!(rewriter.seen.borrow().is_empty());
        assert_eq!(store.count_by_status().await.unwrap(), StatusCounts::default());
    }

    #[tokio::test]
    async fn test_blank_rewrite_is_not_promoted() {
        let store = seeded(1).await;

        let report = run(&store, &Blank, 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        let article = store.fetch(1).await.unwrap().unwrap();
        assert_eq!(article.status, ArticleStatus::New);
        assert_eq!(article.body, "body 1");
    }

    #[tokio::test]
    async fn test_cancel_stops_after_current_row() {
        let store = seeded(3).await;
        let cancel = CancellationToken::new();
        let rewriter = CancelsAfterFirst {
            cancel: cancel.clone(),
            calls: Cell::new(0),
        };

        let report = run(&store, &rewriter, 10, &cancel).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.rewritten, 1);
        assert_eq!(rewriter.calls.get(), 1);
        assert_eq!(status_of(&store, 3).await, ArticleStatus::Rewritten);
        assert_eq!(status_of(&store, 2).await, ArticleStatus::New);
        assert_eq!(status_of(&store, 1).await, ArticleStatus::New);
    }

    #[tokio::test]
    async fn test_lost_race_does_not_overwrite_winner() {
        let store = seeded(1).await;
        let rewriter = Racing {
            store: store.clone(),
        };

        let report = run(&store, &rewriter, 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.lost, 1);
        assert_eq!(report.rewritten, 0);
        let article = store.fetch(1).await.unwrap().unwrap();
        assert_eq!(article.body, "other worker");
    }

    #[tokio::test]
    async fn test_store_failure_aborts_pass() {
        let store = seeded(1).await;
        store.close().await;

        let result = run(&store, &Prefixing::failing_on(&[]), 10, &CancellationToken::new()).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }
}
