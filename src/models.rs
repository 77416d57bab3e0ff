//! Data models for stored articles and the values that flow between stages.
//!
//! - [`Candidate`]: an article as discovered, before it is stored
//! - `Article`: a stored row together with its processing status (test lookups)
//! - [`PendingArticle`] / [`PublishedArticle`]: the projections read by the
//!   rewriting step and by the HTTP endpoint
//! - Reports: per-phase counters used for logging and tests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processing state of a stored article.
///
/// `New` is the only creation state. `Rewritten` is terminal: once a row
/// reaches it, nothing reads it for rewriting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    New,
    Rewritten,
}

impl ArticleStatus {
    /// The value persisted in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Rewritten => "rewritten",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "rewritten" => Ok(Self::Rewritten),
            other => Err(other.to_string()),
        }
    }
}

/// A news article as produced by a discovery source.
///
/// # Fields
///
/// * `title` - Headline as captured; the deduplication key
/// * `link` - Absolute source URL
/// * `body` - Full extracted article text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub link: String,
    pub body: String,
}

/// A stored article row.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub link: String,
    /// Original text while `New`, rewritten text once `Rewritten`.
    pub body: String,
    pub status: ArticleStatus,
}

/// A row awaiting rewriting.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingArticle {
    pub id: i64,
    pub title: String,
    pub body: String,
}

/// A rewritten row as exposed by `GET /api/news`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublishedArticle {
    pub id: i64,
    pub title: String,
    pub body: String,
}

/// Row counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub new: i64,
    pub rewritten: i64,
}

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Candidates returned by discovery.
    pub discovered: usize,
    /// Candidates stored as new rows.
    pub inserted: usize,
    /// Candidates whose title was already stored.
    pub skipped: usize,
    /// Discovery failed and the pass was treated as empty.
    pub discovery_failed: bool,
}

/// Outcome of one transformation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// Rows selected for this pass.
    pub selected: usize,
    /// Rows promoted to `Rewritten`.
    pub rewritten: usize,
    /// Rows left `New` because the rewrite failed or came back empty.
    pub failed: usize,
    /// Rows another writer promoted first.
    pub lost: usize,
    /// The pass stopped early on shutdown.
    pub cancelled: bool,
}

impl TransformReport {
    /// Rows the pass actually attempted.
    pub fn processed(&self) -> usize {
        self.rewritten + self.failed + self.lost
    }
}
