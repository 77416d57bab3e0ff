//! News source scrapers.
//!
//! A scraper is a [`Discover`] implementation: one call returns every article
//! it can currently see on its source as [`Candidate`]s, each with a title,
//! an absolute link and the full extracted body.
//!
//! Scrapers follow the same two-phase pattern:
//!
//! 1. **Indexing**: read the source's front page and collect headline links
//! 2. **Fetching**: download each linked article and extract its text
//!
//! Per-article fetch failures are logged and skipped. Only a failure to read
//! the front page fails the whole call.
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | CNN Lite | [`cnn`] | HTML scraping |

use crate::error::DiscoveryError;
use crate::models::Candidate;
use once_cell::sync::Lazy;
use regex::Regex;

pub mod cnn;

/// Browser-like user agent; some front pages reject library defaults.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0";

/// Headlines shorter than this are navigation chrome, not articles.
pub const MIN_TITLE_CHARS: usize = 10;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// A source of candidate articles.
pub trait Discover {
    async fn discover(&self) -> Result<Vec<Candidate>, DiscoveryError>;
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}
