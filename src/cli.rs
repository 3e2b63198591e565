//! Command-line interface for the ticker news scraper.
//!
//! Run-level choices (which tickers, which page driver, where output goes)
//! are flags. Operational tuning lives in the YAML config; a few of those
//! fields can be overridden here.

use crate::config::ScrapeConfig;
use crate::driver::webdriver::Browser;
use crate::tickers::{SP500_URL, TickerSelection, parse_list};
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DriverKind {
    /// Plain HTTP GET, no scripting.
    Http,
    /// Real browser through a WebDriver endpoint.
    Webdriver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    BigShots,
    Sp500,
}

/// Collect recent news headlines for stock tickers into a CSV file.
///
/// # Examples
///
/// ```sh
/// # A few tickers with the HTTP driver
/// ticker_news --tickers AAPL,MSFT,NVDA -o ./out
///
/// # The first 50 S&P 500 names through chromedriver
/// ticker_news --top 50 --driver webdriver --webdriver-url http://localhost:9515
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group(
    ArgGroup::new("selection")
        .required(true)
        .args(["tickers", "preset", "sp500", "top"])
))]
pub struct Cli {
    /// Comma-separated ticker symbols
    #[arg(short, long)]
    pub tickers: Option<String>,

    /// Predefined ticker list
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Every S&P 500 constituent
    #[arg(long)]
    pub sp500: bool,

    /// The first N S&P 500 constituents
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Output directory for the CSV file
    #[arg(short, long, default_value = ".")]
    pub output_dir: String,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "TICKER_NEWS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Page driver
    #[arg(long, value_enum, default_value_t = DriverKind::Http)]
    pub driver: DriverKind,

    /// WebDriver endpoint (chromedriver, geckodriver, or a Selenium grid)
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    /// Browser requested from the WebDriver endpoint
    #[arg(long, value_enum, default_value_t = Browser::Chrome)]
    pub browser: Browser,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Seconds between ticker sessions (overrides config)
    #[arg(long)]
    pub delay: Option<u64>,

    /// Maximum ticker sessions in flight (overrides config)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Scroll attempts per page (overrides config)
    #[arg(long)]
    pub max_scroll_attempts: Option<usize>,

    /// Stop scrolling once this many items are collected (overrides config)
    #[arg(long)]
    pub target_count: Option<usize>,

    /// Stop starting new tickers after this many seconds
    #[arg(long, value_name = "SECS")]
    pub run_timeout: Option<u64>,

    /// Also write the per-ticker results and summary as JSON
    #[arg(long)]
    pub json_report: Option<PathBuf>,

    /// Page listing the S&P 500 constituents
    #[arg(long, env = "SP500_URL", default_value = SP500_URL)]
    pub sp500_url: String,
}

impl Cli {
    pub fn selection(&self) -> TickerSelection {
        if let Some(list) = &self.tickers {
            TickerSelection::List(parse_list(list))
        } else if let Some(n) = self.top {
            TickerSelection::Top(n)
        } else if self.sp500 || self.preset == Some(Preset::Sp500) {
            TickerSelection::Sp500
        } else {
            TickerSelection::BigShots
        }
    }

    /// Apply flag overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut ScrapeConfig) {
        if let Some(delay) = self.delay {
            config.inter_ticker_delay_secs = delay;
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(n) = self.max_scroll_attempts {
            config.max_scroll_attempts = n;
        }
        if let Some(n) = self.target_count {
            config.target_item_count = n;
        }
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout.map(Duration::from_secs)
    }
}
