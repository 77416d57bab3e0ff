//! Command-line interface definitions for News Factory.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most options can also be supplied through environment variables.

use crate::cycle::DEFAULT_INTERVAL;
use crate::error::ConfigError;
use crate::rewrite::DEFAULT_TEMPLATE;
use crate::server::DEFAULT_PUBLISHED_LIMIT;
use crate::transform::DEFAULT_BATCH_LIMIT;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

/// Command-line arguments for the News Factory application.
///
/// # Examples
///
/// ```sh
/// # Scrape, rewrite and serve, once an hour
/// REWRITE_API_KEY=... news_factory run
///
/// # One cycle against a specific database
/// news_factory --database ./data/news.db cycle --api-key ...
///
/// # Serve what is already rewritten
/// news_factory serve --bind 0.0.0.0:5000
///
/// # Check the scraper without storing anything
/// news_factory scrape
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database file
    #[arg(short, long, env = "NEWS_DATABASE", default_value = "news_data.db", global = true)]
    pub database: String,

    /// Also append log lines to this file
    #[arg(long, env = "NEWS_LOG_FILE", global = true)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a cycle now and then on a fixed interval, while serving the API
    Run(RunArgs),
    /// Run a single cycle and exit
    Cycle(RewriteArgs),
    /// Serve rewritten articles only
    Serve(ServeArgs),
    /// Scrape and print candidates without rewriting
    Scrape(ScrapeArgs),
}

/// Options for the rewriting step.
#[derive(Args, Debug, Clone)]
pub struct RewriteArgs {
    /// API key for the rewrite service
    #[arg(long, env = "REWRITE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to the awful_aj config.yaml (defaults to the awful_aj config dir)
    #[arg(short, long)]
    pub config: Option<String>,

    /// awful_aj template holding the rewriting instructions
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// Maximum articles rewritten per cycle
    #[arg(long, default_value_t = DEFAULT_BATCH_LIMIT)]
    pub batch_limit: u32,
}

impl RewriteArgs {
    /// Check the options before any work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_key()?;
        if self.batch_limit == 0 {
            return Err(ConfigError::InvalidBatchLimit);
        }
        Ok(())
    }

    /// The API key, rejecting a missing or blank value.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey),
        }
    }
}

/// Options for the HTTP projection.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address the API listens on
    #[arg(long, env = "NEWS_BIND", default_value = "127.0.0.1:5000")]
    pub bind: String,

    /// Maximum articles returned by GET /api/news
    #[arg(long, default_value_t = DEFAULT_PUBLISHED_LIMIT)]
    pub published_limit: u32,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub rewrite: RewriteArgs,

    #[command(flatten)]
    pub serve: ServeArgs,

    /// Seconds between cycle starts
    #[arg(long, default_value_t = DEFAULT_INTERVAL.as_secs())]
    pub interval_secs: u64,
}

impl RunArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rewrite.validate()?;
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Store the scraped candidates as new articles
    #[arg(long)]
    pub save: bool,
}
