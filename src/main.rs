//! # News Corpus Crawler
//!
//! Builds a text corpus of Slovene and Serbian news articles and their reader
//! comments. For every configured site the crawler searches a fixed set of
//! language-related keywords, keeps the articles published inside a date
//! window, downloads each article with its full comment thread and stores it
//! as an XML document. The documents of a site are finally bundled into one
//! zip archive.
//!
//! ## Usage
//!
//! ```sh
//! news_corpus_crawler -c crawler.yaml -o ./data -s Politika
//! ```
//!
//! ## Architecture
//!
//! Sites are crawled one after another, each through the same pipeline:
//! 1. **Discovery**: paginate the site search for every keyword
//! 2. **Canonical list**: dedup, sort by title and number; saved as a snapshot
//! 3. **Fetching**: download article bodies and comment threads into XML documents
//! 4. **Archiving**: zip the documents of the site
//!
//! A crawl killed at any point can be restarted with the same options and
//! continues where it stopped.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod catalog;
mod cli;
mod comments;
mod config;
mod crawl;
mod error;
mod fetch;
mod models;
mod outputs;
mod scrapers;
mod transliterate;
mod utils;

use cli::Cli;
use config::Config;
use crawl::Crawler;
use fetch::HttpClient;
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
    info!("news_corpus_crawler starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, ?args.sites, args.refetch, "Parsed CLI arguments");

    let config = match &args.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!(config_path = %path.display(), "Loaded configuration");
            config
        }
        None => {
            info!("No configuration file given; using built-in defaults");
            Config::default()
        }
    };
    info!(min_date = %config.min_date, max_date = %config.max_date, "Crawl window");

    let http = HttpClient::from_config(&config.http)?;

    // Resolve every requested site before touching the network
    let mut adapters = Vec::new();
    for name in args.site_names(&config) {
        let site = config.site(&name)?;
        adapters.push(scrapers::build_adapter(site, &config, http.clone())?);
    }

    let output_dir = args.output_dir.to_string_lossy().into_owned();
    if let Err(e) = ensure_writable_dir(&output_dir).await {
        error!(
            path = %output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let mut failed_sites = 0usize;
    for adapter in &adapters {
        let site = &adapter.site().name;
        let crawler = Crawler::new(adapter.as_ref(), &config, &args.output_dir).skip_existing(!args.refetch);
        match crawler.run().await {
            Ok(report) => info!(%site, ?report, "Site done"),
            Err(e) => {
                failed_sites += 1;
                error!(%site, error = %e, "Site crawl aborted");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        sites = adapters.len(),
        failed_sites,
        elapsed_secs = elapsed.as_secs_f64(),
        "news_corpus_crawler finished"
    );
    Ok(())
}
