//! Small helpers for log formatting and filesystem checks.

use futures::{Stream, StreamExt};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Truncate a string for logging purposes.
///
/// Strings longer than `max` characters are cut at a character boundary and
/// suffixed with an ellipsis and the number of bytes dropped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Make sure the directory that will hold the database file exists.
///
/// A bare file name (no parent component) needs nothing.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_parent_dir(path: &str) -> Result<(), Box<dyn Error>> {
    let Some(parent) = Path::new(path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).await?;
    info!(dir = %parent.display(), "Database directory ready");
    Ok(())
}

/// Cancel `cancel` on the first interrupt.
///
/// Returns `true` when a second interrupt arrives before the stream ends; the
/// caller should then exit without waiting for the current cycle.
pub async fn watch_interrupts<S>(interrupts: S, cancel: CancellationToken) -> bool
where
    S: Stream<Item = ()>,
{
    let mut interrupts = std::pin::pin!(interrupts);

    if interrupts.next().await.is_none() {
        return false;
    }
    info!("System shutting down gracefully... (interrupt again to force quit)");
    cancel.cancel();

    if interrupts.next().await.is_none() {
        return false;
    }
    warn!("Second interrupt received; exiting immediately");
    true
}
