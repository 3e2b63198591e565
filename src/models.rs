//! Data models for scraped news items and per-ticker fetch outcomes.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NewsItem`]: one headline extracted from a ticker's news page
//! - [`FetchStatus`]: terminal status of a ticker's page session
//! - [`FetchResult`]: everything one ticker's session produced
//! - [`RunSummary`]: per-ticker lines and per-status counts reported at the
//!   end of a run

use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Written in place of optional fields the page did not provide.
pub const SENTINEL: &str = "unknown";

/// A single news headline as extracted from a quote's news page.
///
/// `ticker`, `headline` and `url` are never empty once an item has passed
/// through [`merge`](crate::normalize::merge). Identity is `(ticker, url)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsItem {
    /// Uppercase ticker symbol the page was fetched for.
    pub ticker: String,
    /// Headline text.
    pub headline: String,
    /// Absolute article URL.
    pub url: String,
    /// Publisher name, or [`SENTINEL`].
    pub source: String,
    /// Publication time exactly as shown on the page ("2 hours ago"), or [`SENTINEL`].
    pub article_timestamp_raw: String,
    /// When the item was extracted. Never updated afterwards.
    pub scraped_at: DateTime<Utc>,
}

impl NewsItem {
    /// True when all three required fields carry text.
    pub fn is_complete(&self) -> bool {
        !self.ticker.trim().is_empty()
            && !self.headline.trim().is_empty()
            && !self.url.trim().is_empty()
    }
}

/// Terminal status of one ticker's page session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// At least one item was extracted.
    Ok,
    /// The page says there is no news for this ticker.
    Empty,
    /// 503/429 or the site's rate-limit page. Callers should back off.
    RateLimited,
    /// The news page does not exist.
    NotFound,
    /// Navigation, content wait or the whole session ran out of time.
    Timeout,
    /// The page loaded but no item could be extracted and no "no news"
    /// marker was present. Usually means the markup changed.
    ParseFailed,
    /// Anything else.
    UnexpectedError,
}

impl FetchStatus {
    pub const ALL: [FetchStatus; 7] = [
        FetchStatus::Ok,
        FetchStatus::Empty,
        FetchStatus::RateLimited,
        FetchStatus::NotFound,
        FetchStatus::Timeout,
        FetchStatus::ParseFailed,
        FetchStatus::UnexpectedError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Ok => "ok",
            FetchStatus::Empty => "empty",
            FetchStatus::RateLimited => "rate_limited",
            FetchStatus::NotFound => "not_found",
            FetchStatus::Timeout => "timeout",
            FetchStatus::ParseFailed => "parse_failed",
            FetchStatus::UnexpectedError => "unexpected_error",
        }
    }

    /// `ok` and `empty` are normal outcomes; everything else is a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, FetchStatus::Ok | FetchStatus::Empty)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one ticker's page session produced.
///
/// Created by the orchestrator once per ticker and consumed by
/// [`merge`](crate::normalize::merge).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchResult {
    pub ticker: String,
    pub status: FetchStatus,
    /// Items in page order (earlier scroll attempts first).
    pub items: Vec<NewsItem>,
    /// Short diagnostic for failures.
    pub detail: Option<String>,
    /// Name of the selector strategy that found candidates, if any did.
    pub strategy: Option<String>,
    /// Candidate nodes skipped because a headline or link was missing.
    pub skipped_nodes: usize,
    /// Page reads performed in the scroll loop.
    pub attempts: usize,
    pub elapsed_ms: u64,
}

impl FetchResult {
    /// A result for a session that ended before producing anything.
    pub fn failed(ticker: &str, status: FetchStatus, detail: impl Into<String>) -> Self {
        Self {
            ticker: ticker.to_string(),
            status,
            items: Vec::new(),
            detail: Some(detail.into()),
            strategy: None,
            skipped_nodes: 0,
            attempts: 0,
            elapsed_ms: 0,
        }
    }
}

const SUMMARY_DETAIL_CHARS: usize = 120;

/// One line of the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TickerOutcome {
    pub ticker: String,
    pub status: FetchStatus,
    /// Items the session collected, before cross-ticker dedup.
    pub items: usize,
    /// Failure diagnostic, shortened for display.
    pub detail: Option<String>,
}

/// Per-ticker outcomes, per-status counts and totals for one run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub tickers_requested: usize,
    /// Tickers never started because the run was cancelled or hit its deadline.
    pub tickers_not_started: usize,
    pub status_counts: BTreeMap<FetchStatus, usize>,
    /// Started tickers in input order.
    pub tickers: Vec<TickerOutcome>,
    /// Items left after dedup.
    pub total_items: usize,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn new(
        started_at: DateTime<Utc>,
        tickers_requested: usize,
        results: &[FetchResult],
        total_items: usize,
        elapsed: Duration,
    ) -> Self {
        let mut status_counts = BTreeMap::new();
        for r in results {
            *status_counts.entry(r.status).or_insert(0) += 1;
        }
        let tickers = results
            .iter()
            .map(|r| TickerOutcome {
                ticker: r.ticker.clone(),
                status: r.status,
                items: r.items.len(),
                detail: r.detail.as_deref().map(|d| truncate_for_log(d, SUMMARY_DETAIL_CHARS)),
            })
            .collect();
        Self {
            started_at,
            tickers_requested,
            tickers_not_started: tickers_requested.saturating_sub(results.len()),
            status_counts,
            tickers,
            total_items,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn count(&self, status: FetchStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run summary ---")?;
        writeln!(f, "Tickers requested: {}", self.tickers_requested)?;
        if self.tickers_not_started > 0 {
            writeln!(f, "Tickers not started: {}", self.tickers_not_started)?;
        }
        for t in &self.tickers {
            write!(f, "  {:<8} {:<17} {:>3} items", t.ticker, t.status.as_str(), t.items)?;
            match &t.detail {
                Some(detail) if !detail.is_empty() => writeln!(f, "  ({detail})")?,
                _ => writeln!(f)?,
            }
        }
        writeln!(f, "By status:")?;
        for status in FetchStatus::ALL {
            let n = self.count(status);
            if n > 0 {
                writeln!(f, "  {:<17} {}", status.as_str(), n)?;
            }
        }
        writeln!(f, "Total articles collected: {}", self.total_items)?;
        write!(f, "Elapsed: {:.2}s", self.elapsed_ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(ticker: &str, url: &str) -> NewsItem {
        NewsItem {
            ticker: ticker.to_string(),
            headline: "Apple beats estimates".to_string(),
            url: url.to_string(),
            source: SENTINEL.to_string(),
            article_timestamp_raw: SENTINEL.to_string(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_news_item_completeness() {
        assert!(item("AAPL", "https://finance.yahoo.com/news/a.html").is_complete());
        assert!(!item("AAPL", "  ").is_complete());
        assert!(!item("", "https://finance.yahoo.com/news/a.html").is_complete());
    }

    #[test]
    fn test_fetch_status_serialization() {
        let json = serde_json::to_string(&FetchStatus::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
        let status: FetchStatus = serde_json::from_str("\"parse_failed\"").unwrap();
        assert_eq!(status, FetchStatus::ParseFailed);
        assert_eq!(FetchStatus::UnexpectedError.to_string(), "unexpected_error");
    }

    #[test]
    fn test_failure_classes() {
        assert!(!FetchStatus::Ok.is_failure());
        assert!(!FetchStatus::Empty.is_failure());
        assert!(FetchStatus::ParseFailed.is_failure());
        assert!(FetchStatus::RateLimited.is_failure());
    }

    #[test]
    fn test_run_summary_counts() {
        let mut ok = FetchResult::failed("AAPL", FetchStatus::Ok, "");
        ok.detail = None;
        ok.items.push(item("AAPL", "https://finance.yahoo.com/news/a.html"));
        let results = vec![
            ok,
            FetchResult::failed("ZZZZ", FetchStatus::Timeout, "timed out during content wait"),
        ];

        let summary = RunSummary::new(Utc::now(), 3, &results, 1, Duration::from_millis(1500));
        assert_eq!(summary.count(FetchStatus::Ok), 1);
        assert_eq!(summary.count(FetchStatus::Timeout), 1);
        assert_eq!(summary.count(FetchStatus::Empty), 0);
        assert_eq!(summary.tickers_not_started, 1);

        assert_eq!(
            summary.tickers[1],
            TickerOutcome {
                ticker: "ZZZZ".to_string(),
                status: FetchStatus::Timeout,
                items: 0,
                detail: Some("timed out during content wait".to_string()),
            }
        );
        assert_eq!(summary.tickers[0].items, 1);

        let text = summary.to_string();
        let zzzz = text.lines().find(|l| l.contains("ZZZZ")).unwrap();
        assert!(zzzz.contains("timeout"));
        assert!(zzzz.contains("0 items"));
        assert!(zzzz.contains("(timed out during content wait)"));
        let aapl = text.lines().find(|l| l.contains("AAPL")).unwrap();
        assert!(aapl.contains("ok"));
        assert!(aapl.contains("1 items"));
        assert!(!aapl.contains('('));
        assert!(text.contains("Total articles collected: 1"));
        assert!(text.contains("1.50s"));
    }

    #[test]
    fn test_run_summary_shortens_long_details() {
        let long = "x".repeat(500);
        let results = vec![FetchResult::failed("BOOM", FetchStatus::UnexpectedError, long)];
        let summary = RunSummary::new(Utc::now(), 1, &results, 0, Duration::ZERO);
        let detail = summary.tickers[0].detail.as_deref().unwrap();
        assert!(detail.starts_with(&"x".repeat(SUMMARY_DETAIL_CHARS)));
        assert!(detail.contains("bytes)"));
    }
}
