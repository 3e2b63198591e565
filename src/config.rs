//! Operational parameters for a scraping run.
//!
//! Everything that depends on the remote site's current markup or on how
//! hard we are willing to hit it lives here rather than in code. The file is
//! YAML, every field is optional, and a handful of fields can be overridden
//! from the command line (see [`crate::cli::Cli`]).
//!
//! ```yaml
//! inter_ticker_delay_secs: 8
//! max_scroll_attempts: 3
//! target_item_count: 30
//! content_ready_selector: "li.stream-item"
//! ```
//!
//! The scroll defaults (5 attempts, 15 items) and settle intervals are not
//! tuned values. Adjust them when the site behaves differently.

use crate::error::ScrapeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Placeholder substituted with the URL-encoded ticker in [`ScrapeConfig::news_path`].
pub const TICKER_PLACEHOLDER: &str = "{ticker}";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Site origin. Relative article links are resolved against it.
    pub base_url: String,
    /// Path of a quote's news page, containing `{ticker}`.
    pub news_path: String,
    pub user_agent: String,
    /// Per-request timeout for the HTTP driver and the WebDriver client.
    pub request_timeout_secs: u64,
    /// Minimum gap between the start of two ticker sessions.
    pub inter_ticker_delay_secs: u64,
    /// Extra random delay (0..=jitter) added to the inter-ticker delay.
    pub delay_jitter_ms: u64,
    /// Bound on waiting for `content_ready_selector`.
    pub page_load_timeout_secs: u64,
    /// Bound on a whole ticker session, including driver release.
    pub session_timeout_secs: u64,
    /// Pause after each scroll before the next read.
    pub settle_interval_ms: u64,
    /// Pause after the content is ready before the first read.
    pub initial_settle_ms: u64,
    pub max_scroll_attempts: usize,
    pub target_item_count: usize,
    /// Maximum ticker sessions in flight.
    pub concurrency: usize,
    /// Button that rejects the cookie consent interstitial.
    pub consent_selector: String,
    /// Optional "jump to end" button some locales show above the list.
    pub scroll_button_selector: Option<String>,
    /// Element whose presence means the news list has rendered.
    pub content_ready_selector: String,
    /// Text the site shows when a quote legitimately has no news.
    pub no_news_marker: String,
    /// Text of the site's rate-limit page.
    pub rate_limit_marker: String,
    /// Text of the page shown for an unknown symbol. Browsers land on it
    /// with a normal status, so it is matched in the rendered page.
    /// Empty disables the check.
    pub not_found_marker: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://finance.yahoo.com".to_string(),
            news_path: "/quote/{ticker}/news".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 20,
            inter_ticker_delay_secs: 5,
            delay_jitter_ms: 0,
            page_load_timeout_secs: 30,
            session_timeout_secs: 180,
            settle_interval_ms: 5000,
            initial_settle_ms: 3000,
            max_scroll_attempts: 5,
            target_item_count: 15,
            concurrency: 1,
            consent_selector: "button.reject-all".to_string(),
            scroll_button_selector: Some("button#scroll-down-btn".to_string()),
            content_ready_selector:
                "li.stream-item.story-item, section[data-testid=\"storyitem\"]".to_string(),
            no_news_marker: "There are no news reports for this period".to_string(),
            rate_limit_marker: "Too Many Requests".to_string(),
            not_found_marker: "Symbols similar to".to_string(),
        }
    }
}

impl ScrapeConfig {
    /// Load the YAML config at `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, ScrapeError> {
        let config = match path {
            Some(p) => {
                let text = tokio::fs::read_to_string(p).await?;
                let config: ScrapeConfig = serde_yaml::from_str(&text)?;
                info!(path = %p.display(), "Loaded scrape configuration");
                config
            }
            None => {
                info!("No config file given; using defaults");
                ScrapeConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        if !self.news_path.contains(TICKER_PLACEHOLDER) {
            return Err(ScrapeError::Config(format!(
                "news_path `{}` must contain {TICKER_PLACEHOLDER}",
                self.news_path
            )));
        }
        if self.max_scroll_attempts == 0 {
            return Err(ScrapeError::Config("max_scroll_attempts must be at least 1".into()));
        }
        if self.target_item_count == 0 {
            return Err(ScrapeError::Config("target_item_count must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ScrapeError::Config("concurrency must be at least 1".into()));
        }
        self.base()?;
        Ok(())
    }

    pub fn base(&self) -> Result<Url, ScrapeError> {
        Ok(Url::parse(&self.base_url)?)
    }

    /// Absolute news page URL for `ticker`.
    pub fn news_url(&self, ticker: &str) -> Result<String, ScrapeError> {
        let path = self
            .news_path
            .replace(TICKER_PLACEHOLDER, &urlencoding::encode(ticker));
        Ok(self.base()?.join(&path)?.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn inter_ticker_delay(&self) -> Duration {
        Duration::from_secs(self.inter_ticker_delay_secs)
    }
}
