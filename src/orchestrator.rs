//! Runs one page session per ticker and classifies how each one ended.
//!
//! Sessions are issued in ticker order, at least `inter_ticker_delay` apart,
//! with at most `concurrency` in flight. Results come back in ticker order
//! whatever order the sessions finish in. A ticker's failure is recorded in
//! its [`FetchResult`] and never stops the batch. Rate-limited tickers are
//! not retried here; the status is surfaced so the caller can back off.
//!
//! Setting the cancel flag (or passing the run deadline) stops new sessions
//! from being issued. Sessions already running finish or hit their own
//! timeout.

use crate::config::ScrapeConfig;
use crate::driver::{DriverFactory, PageDriver};
use crate::error::ScrapeError;
use crate::models::{FetchResult, FetchStatus};
use crate::scrapers::session::{PageHarvest, PageSession};
use crate::utils::truncate_for_log;
use futures::future::ready;
use futures::stream::{self, StreamExt};
use rand::{Rng, rng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{Instant, error::Elapsed, sleep, timeout};
use tracing::{info, instrument, warn};
use url::Url;

pub struct Orchestrator<F: DriverFactory> {
    factory: F,
    config: ScrapeConfig,
    base: Url,
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl<F: DriverFactory> Orchestrator<F> {
    pub fn new(factory: F, config: ScrapeConfig) -> Result<Self, ScrapeError> {
        config.validate()?;
        let base = config.base()?;
        Ok(Self {
            factory,
            config,
            base,
            cancel: Arc::new(AtomicBool::new(false)),
            deadline: None,
        })
    }

    /// Share a cancel flag with a signal handler or a supervising task.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stop issuing new sessions once `limit` has passed from now.
    pub fn with_run_timeout(mut self, limit: Duration) -> Self {
        self.deadline = Some(Instant::now() + limit);
        self
    }

    fn should_stop(&self) -> bool {
        self.cancel.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    async fn pace(&self) {
        let mut delay = self.config.inter_ticker_delay();
        if self.config.delay_jitter_ms > 0 {
            delay += Duration::from_millis(rng().random_range(0..=self.config.delay_jitter_ms));
        }
        if !delay.is_zero() {
            info!(?delay, "Waiting before next ticker");
            sleep(delay).await;
        }
    }

    /// Fetch every ticker, one page session each.
    ///
    /// # Arguments
    ///
    /// * `tickers` - Symbols in the order they should be issued
    ///
    /// # Returns
    ///
    /// One [`FetchResult`] per started ticker, in input order. Tickers not
    /// started because of cancellation or the run deadline are missing.
    #[instrument(level = "info", skip_all, fields(tickers = tickers.len(), concurrency = self.config.concurrency))]
    pub async fn run(&self, tickers: &[String]) -> Vec<FetchResult> {
        let total = tickers.len();
        let results: Vec<FetchResult> = stream::iter(tickers.iter().enumerate())
            .then(move |(i, ticker)| async move {
                if i > 0 {
                    self.pace().await;
                }
                (i, ticker)
            })
            .take_while(move |_| ready(!self.should_stop()))
            .map(move |(i, ticker)| self.fetch_ticker(i, total, ticker))
            .buffered(self.config.concurrency)
            .collect()
            .await;

        if results.len() < total {
            warn!(
                started = results.len(),
                skipped = total - results.len(),
                "Run cancelled before all tickers were started"
            );
        }
        results
    }

    #[instrument(level = "info", skip(self, index, total), fields(n = index + 1, of = total))]
    async fn fetch_ticker(&self, index: usize, total: usize, ticker: &str) -> FetchResult {
        let started = Instant::now();
        info!("Processing ticker");

        let url = match self.config.news_url(ticker) {
            Ok(url) => url,
            Err(e) => return FetchResult::failed(ticker, FetchStatus::UnexpectedError, e.to_string()),
        };

        let mut driver = match self.factory.acquire().await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Could not acquire a page driver");
                return FetchResult::failed(ticker, e.status(), truncate_for_log(&e.to_string(), 200));
            }
        };

        let outcome = {
            let mut session = PageSession::new(&mut driver, &self.config, &self.base, ticker);
            timeout(self.config.session_timeout(), session.run(&url)).await
        };
        if let Err(e) = driver.release().await {
            warn!(error = %e, "Failed to release page driver");
        }

        let mut result = classify(ticker, outcome);
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        if result.status.is_failure() {
            warn!(
                status = %result.status,
                detail = result.detail.as_deref().unwrap_or(""),
                elapsed_ms = result.elapsed_ms,
                "Ticker failed"
            );
        } else {
            info!(
                status = %result.status,
                items = result.items.len(),
                attempts = result.attempts,
                elapsed_ms = result.elapsed_ms,
                "Ticker finished"
            );
        }
        result
    }
}

/// Map a session's outcome to the ticker's terminal status.
pub fn classify(ticker: &str, outcome: Result<Result<PageHarvest, ScrapeError>, Elapsed>) -> FetchResult {
    let harvest = match outcome {
        Err(_) => {
            return FetchResult::failed(ticker, FetchStatus::Timeout, "session exceeded its time limit");
        }
        Ok(Err(e)) => {
            return FetchResult::failed(ticker, e.status(), truncate_for_log(&e.to_string(), 200));
        }
        Ok(Ok(harvest)) => harvest,
    };

    let (status, detail) = if !harvest.items.is_empty() {
        (FetchStatus::Ok, None)
    } else if harvest.no_news {
        (FetchStatus::Empty, Some("site reports no news for this ticker".to_string()))
    } else {
        let detail = match harvest.strategy {
            Some(name) => format!(
                "strategy `{name}` matched but all {} nodes were skipped",
                harvest.skipped_nodes
            ),
            None => "no known news container found; markup may have changed".to_string(),
        };
        (FetchStatus::ParseFailed, Some(detail))
    };

    FetchResult {
        ticker: ticker.to_string(),
        status,
        items: harvest.items,
        detail,
        strategy: harvest.strategy.map(str::to_string),
        skipped_nodes: harvest.skipped_nodes,
        attempts: harvest.attempts,
        elapsed_ms: 0,
    }
}
