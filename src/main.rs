//! # Ticker News
//!
//! Collects recent news headlines for a list of stock tickers from a quote
//! site's per-ticker news page and writes them to a timestamped CSV file.
//!
//! ## Usage
//!
//! ```sh
//! ticker_news --tickers AAPL,MSFT -o ./out
//! ticker_news --preset big-shots --driver webdriver
//! ```
//!
//! ## Architecture
//!
//! 1. **Tickers**: resolve the manual list, preset, or S&P 500 constituents
//! 2. **Fetching**: one page session per ticker, paced and bounded
//! 3. **Merging**: normalize and dedupe items across tickers
//! 4. **Output**: CSV, optional JSON run report, and a run summary on stdout
//!
//! A ticker that fails never stops the run; its status is counted in the
//! summary. Setup failures (bad config, unwritable output directory, no
//! tickers) exit non-zero.

use chrono::{Local, Utc};
use clap::Parser;
use reqwest::Client;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod driver;
mod error;
mod models;
mod normalize;
mod orchestrator;
mod outputs;
mod scrapers;
mod tickers;
mod utils;

use cli::{Cli, DriverKind};
use config::ScrapeConfig;
use driver::DriverFactory;
use driver::http::HttpDriverFactory;
use driver::webdriver::WebDriverFactory;
use models::{FetchResult, RunSummary};
use orchestrator::Orchestrator;
use outputs::json::RunReport;
use utils::{ensure_writable_dir, output_csv_path};

async fn scrape<F: DriverFactory>(
    factory: F,
    config: ScrapeConfig,
    args: &Cli,
    cancel: Arc<AtomicBool>,
    tickers: &[String],
) -> Result<Vec<FetchResult>, Box<dyn Error>> {
    let mut orchestrator = Orchestrator::new(factory, config)?.with_cancel(cancel);
    if let Some(limit) = args.run_timeout() {
        orchestrator = orchestrator.with_run_timeout(limit);
    }
    Ok(orchestrator.run(tickers).await)
}

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
    let started_at = Utc::now();
    info!("ticker_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Config ----
    let mut config = match ScrapeConfig::load(args.config.as_deref()).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    args.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Tickers ----
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.request_timeout())
        .build()?;
    let tickers = match tickers::resolve(&args.selection(), &client, &args.sp500_url).await {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Could not resolve tickers");
            return Err(e.into());
        }
    };
    info!(count = tickers.len(), "Resolved tickers");
    debug!(?tickers, "Ticker list");

    // ---- Cancellation ----
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received; finishing running tickers and stopping");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    // ---- Fetch ----
    let results = match args.driver {
        DriverKind::Http => {
            let factory = HttpDriverFactory::new(&config)?;
            scrape(factory, config, &args, cancel, &tickers).await?
        }
        DriverKind::Webdriver => {
            let factory = WebDriverFactory::new(&args.webdriver_url, args.browser, !args.headed, &config)?;
            scrape(factory, config, &args, cancel, &tickers).await?
        }
    };

    // ---- Merge & output ----
    let items = normalize::merge(&results);
    info!(tickers = results.len(), items = items.len(), "Merged results");

    let csv_path = output_csv_path(&args.output_dir, Local::now());
    match outputs::csv::write_news_csv(&items, &csv_path).await {
        Ok(()) => {
            if let Err(e) = outputs::csv::verify_news_csv(&items, &csv_path).await {
                error!(path = %csv_path.display(), error = %e, "CSV does not match merged items");
            }
        }
        Err(e) => error!(path = %csv_path.display(), error = %e, "Failed to write CSV"),
    }

    let summary = RunSummary::new(started_at, tickers.len(), &results, items.len(), start_time.elapsed());

    if let Some(path) = &args.json_report {
        let report = RunReport {
            summary: summary.clone(),
            results,
        };
        if let Err(e) = outputs::json::write_report(&report, path).await {
            error!(path = %path.display(), error = %e, "Failed to write JSON report");
        }
    }

    println!("{summary}");

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        total_items = summary.total_items,
        "Execution complete"
    );

    Ok(())
}
