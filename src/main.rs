//! # News Factory
//!
//! A scheduled pipeline that scrapes news articles, rewrites them through an
//! LLM, keeps both stages in a SQLite table and serves the rewritten articles
//! over a small read-only HTTP API.
//!
//! ## Usage
//!
//! ```sh
//! REWRITE_API_KEY=... news_factory run
//! ```
//!
//! ## Architecture
//!
//! Each cycle runs two phases against the article store:
//! 1. **Ingestion**: scrape CNN Lite and store unseen headlines as `new`
//! 2. **Transformation**: rewrite up to `--batch-limit` `new` articles and
//!    promote each success to `rewritten`
//!
//! A cycle runs at startup and then every `--interval-secs`. `GET /api/news`
//! serves the latest rewritten articles concurrently with the cycles.

use clap::Parser;
use futures::stream;
use std::error::Error;
use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod cycle;
mod error;
mod ingest;
mod models;
mod rewrite;
mod scrapers;
mod server;
mod store;
mod transform;
mod utils;

use cli::{Cli, Command, RewriteArgs, RunArgs, ScrapeArgs, ServeArgs};
use cycle::Factory;
use rewrite::{AwfulRewriter, RetryRewrite};
use scrapers::Discover;
use scrapers::cnn::CnnLite;
use store::Store;
use utils::{ensure_parent_dir, truncate_for_log, watch_interrupts};

const REWRITE_MAX_RETRIES: usize = 5;
const REWRITE_BASE_DELAY: Duration = Duration::from_secs(1);
/// 128 + SIGINT.
const FORCED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    init_tracing(args.log_file.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), "System initializing");
    debug!(database = %args.database, command = ?args.command, "Parsed CLI arguments");

    ensure_parent_dir(&args.database).await?;

    match args.command {
        Command::Run(run) => run_factory(&args.database, run).await,
        Command::Cycle(rewrite) => run_single_cycle(&args.database, rewrite).await,
        Command::Serve(serve) => run_server(&args.database, serve).await,
        Command::Scrape(scrape) => run_scrape(&args.database, scrape).await,
    }
}

fn init_tracing(log_file: Option<&str>) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339());

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Mutex::new(file)))
                .init();
        }
        None => builder.init(),
    }
    Ok(())
}

/// Cancel `cancel` on the first Ctrl-C and exit on the second.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    let signals = stream::unfold((), |()| async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(((), ())),
            Err(e) => {
                warn!(error = %e, "Could not listen for Ctrl-C");
                None
            }
        }
    });

    tokio::spawn(async move {
        if watch_interrupts(signals, cancel).await {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });
}

async fn load_rewriter(args: &RewriteArgs) -> Result<RetryRewrite<AwfulRewriter>, Box<dyn Error>> {
    args.validate()?;
    let rewriter =
        AwfulRewriter::load(args.config.as_deref(), &args.template, args.api_key()?).await?;
    Ok(RetryRewrite::new(
        rewriter,
        REWRITE_MAX_RETRIES,
        REWRITE_BASE_DELAY,
    ))
}

async fn run_factory(database: &str, args: RunArgs) -> Result<(), Box<dyn Error>> {
    args.validate()?;
    let rewriter = load_rewriter(&args.rewrite).await?;
    let store = Store::open(database).await?;
    let factory = Factory::new(store.clone(), CnnLite::new()?, rewriter, args.rewrite.batch_limit);

    let listener = server::bind(&args.serve.bind).await?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let server = tokio::spawn({
        let (store, cancel) = (store.clone(), cancel.clone());
        let limit = args.serve.published_limit;
        async move {
            if let Err(e) = server::serve(listener, store, limit, cancel).await {
                error!(error = %e, "News API failed");
            }
        }
    });

    factory.run_forever(args.interval(), &cancel).await;
    cancel.cancel();

    if let Err(e) = server.await {
        error!(error = %e, "News API task panicked");
    }
    store.close().await;
    Ok(())
}

async fn run_single_cycle(database: &str, args: RewriteArgs) -> Result<(), Box<dyn Error>> {
    let rewriter = load_rewriter(&args).await?;
    let store = Store::open(database).await?;
    let factory = Factory::new(store.clone(), CnnLite::new()?, rewriter, args.batch_limit);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let report = factory.run_cycle(&cancel).await;
    store.close().await;
    info!(elapsed_secs = report.elapsed.as_secs(), "Single cycle finished");

    report.ingest?;
    if let Some(transform) = report.transform {
        transform?;
    }
    Ok(())
}

async fn run_server(database: &str, args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let store = Store::open(database).await?;
    let listener = server::bind(&args.bind).await?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    server::serve(listener, store.clone(), args.published_limit, cancel).await?;
    store.close().await;
    Ok(())
}

async fn run_scrape(database: &str, args: ScrapeArgs) -> Result<(), Box<dyn Error>> {
    info!("Starting scraper test...");
    let candidates = CnnLite::new()?.discover().await?;

    if candidates.is_empty() {
        warn!("Scraper returned 0 results. Check the selectors or your connection.");
        return Ok(());
    }
    info!(count = candidates.len(), "Successfully scraped articles");
    for candidate in &candidates {
        info!(
            title = %candidate.title,
            link = %candidate.link,
            body = %truncate_for_log(&candidate.body, 100),
            "Candidate"
        );
    }

    if !args.save {
        return Ok(());
    }

    let store = Store::open(database).await?;
    ingest::merge(&store, candidates).await?;

    println!("\n--- DATABASE CHECK (First 3 Rows) ---");
    for (title, preview) in store.preview(3).await? {
        println!("TITLE: {title}");
        println!("BODY PREVIEW: {preview}...");
        println!("{}", "-".repeat(30));
    }
    store.close().await;
    Ok(())
}
