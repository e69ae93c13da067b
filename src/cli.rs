//! Command-line interface definitions for Regional News.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every argument can be provided via command-line flag or environment variable.

use clap::Parser;

/// Command-line arguments for the Regional News ingestor.
///
/// # Examples
///
/// ```sh
/// # Every built-in source
/// regional_news -j ./json
///
/// # Two sources from a custom profile table, gentler on the sites
/// regional_news -j ./json -c ./sites.yaml -s vecherka -s rostof --concurrency 2
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON files
    #[arg(short, long, env = "NEWS_JSON_OUTPUT_DIR")]
    pub json_output_dir: String,

    /// Optional path to a sites.yaml profile table (defaults to the built-in one)
    #[arg(short, long, env = "NEWS_CONFIG")]
    pub config: Option<String>,

    /// Only ingest these source ids (repeatable)
    #[arg(short, long = "source", env = "NEWS_SOURCES", value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Article pages fetched concurrently per source
    #[arg(long, env = "NEWS_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "NEWS_TIMEOUT_SECS", default_value_t = 20)]
    pub timeout_secs: u64,

    /// Retries per request before giving up
    #[arg(long, env = "NEWS_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: usize,

    /// User-Agent header sent with every request
    #[arg(
        long,
        env = "NEWS_USER_AGENT",
        default_value = concat!("regional_news/", env!("CARGO_PKG_VERSION"))
    )]
    pub user_agent: String,
}
