//! # Regional News
//!
//! An ingestion pipeline for regional news sites. Each site is described by a
//! declarative profile; the pipeline reads the site's RSS feed or paginated
//! listing, fetches every selected article and turns its body into an ordered
//! list of typed content blocks (text, quotes, images, videos, links).
//!
//! ## Usage
//!
//! ```sh
//! regional_news -j ./json
//! regional_news -j ./json --source vecherka --source rostof
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Profiles**: Load the built-in (or `--config`) profile table and pick
//!    the requested sources
//! 2. **Indexing**: Discover candidate articles from each feed or listing
//! 3. **Extraction**: Fetch article pages (bounded concurrency per source) and
//!    run the profile-driven extraction engine
//! 4. **Output**: Write one JSON file per source under a dated directory
//!
//! Sources run concurrently. A failing source is logged and never stops the
//! others.

use clap::Parser;
use futures::future::join_all;
use itertools::Itertools;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod extract;
mod fetch;
mod ingest;
mod media;
mod models;
mod outputs;
mod profile;
mod utils;

use cli::Cli;
use fetch::{HttpFetcher, RetryFetch};
use ingest::ingest_source;
use outputs::json;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("regional_news starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.json_output_dir, ?args.config, ?args.sources, "Parsed CLI arguments");

    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        error!(
            path = %args.json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load profiles ----
    let profiles = match &args.config {
        Some(path) => profile::load_file(path).await?,
        None => profile::builtin()?,
    };
    let selected = profile::select(profiles, &args.sources);
    if selected.is_empty() {
        warn!("No sources selected; nothing to do");
        return Ok(());
    }
    info!(
        sources = %selected.iter().map(|p| p.id.as_str()).join(","),
        concurrency = args.concurrency,
        "Selected sources"
    );

    // ---- Ingest every source ----
    let http = HttpFetcher::new(&args.user_agent, Duration::from_secs(args.timeout_secs))?;
    let fetcher = RetryFetch::new(http, args.max_retries, Duration::from_secs(1));

    let runs = selected.iter().map(|site| {
        let fetcher = &fetcher;
        let json_output_dir = args.json_output_dir.as_str();
        let concurrency = args.concurrency;
        async move {
            let posts = ingest_source(fetcher, site, concurrency).await;
            if let Err(e) = json::write_posts(json_output_dir, &site.id, &posts).await {
                error!(source = %site.id, error = %e, "Failed to write JSON");
            }
            posts.len()
        }
    });
    let counts = join_all(runs).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        posts = counts.iter().sum::<usize>(),
        "Execution complete"
    );

    Ok(())
}
