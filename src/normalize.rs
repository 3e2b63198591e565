//! Merge per-ticker results into the final record set.
//!
//! Pure: flatten in ticker-then-page order, tidy the fields, drop items
//! missing a required field, and keep the first item seen for each
//! `(ticker, url)`.

use crate::models::{FetchResult, NewsItem, SENTINEL};
use itertools::Itertools;

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

fn or_sentinel(s: &str) -> String {
    let t = s.trim();
    if t.is_empty() { SENTINEL.to_string() } else { t.to_string() }
}

/// Canonical form of one item. `scraped_at` is left untouched.
pub fn normalize(item: &NewsItem) -> NewsItem {
    NewsItem {
        ticker: item.ticker.trim().to_uppercase(),
        headline: collapse_whitespace(&item.headline),
        url: item.url.trim().to_string(),
        source: or_sentinel(&item.source),
        article_timestamp_raw: or_sentinel(&item.article_timestamp_raw),
        scraped_at: item.scraped_at,
    }
}

/// Deduplicated, stable-ordered items from all results.
///
/// # Arguments
///
/// * `results` - Per-ticker results in run order, failures included
///
/// # Returns
///
/// Normalized items with an empty ticker, headline or url dropped, keeping
/// the first occurrence of each `(ticker, url)`.
pub fn merge(results: &[FetchResult]) -> Vec<NewsItem> {
    results
        .iter()
        .flat_map(|r| r.items.iter())
        .map(normalize)
        .filter(NewsItem::is_complete)
        .unique_by(|item| (item.ticker.clone(), item.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchStatus;
    use chrono::{Duration, Utc};

    fn item(ticker: &str, url: &str, headline: &str) -> NewsItem {
        NewsItem {
            ticker: ticker.to_string(),
            headline: headline.to_string(),
            url: url.to_string(),
            source: "Reuters".to_string(),
            article_timestamp_raw: "1 hour ago".to_string(),
            scraped_at: Utc::now(),
        }
    }

    fn result(ticker: &str, items: Vec<NewsItem>) -> FetchResult {
        FetchResult {
            ticker: ticker.to_string(),
            status: FetchStatus::Ok,
            items,
            detail: None,
            strategy: Some("stream-item".to_string()),
            skipped_nodes: 0,
            attempts: 1,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_duplicate_across_results_keeps_first() {
        let mut first = item("AAPL", "https://finance.yahoo.com/news/a.html", "First copy");
        first.scraped_at = Utc::now() - Duration::seconds(30);
        let second = item("AAPL", "https://finance.yahoo.com/news/a.html", "Second copy");

        let merged = merge(&[result("AAPL", vec![first.clone()]), result("AAPL", vec![second])]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].headline, "First copy");
        assert_eq!(merged[0].scraped_at, first.scraped_at);
    }

    #[test]
    fn test_same_url_different_ticker_is_kept() {
        let url = "https://finance.yahoo.com/news/big-tech.html";
        let merged = merge(&[
            result("AAPL", vec![item("AAPL", url, "Big tech")]),
            result("MSFT", vec![item("MSFT", url, "Big tech")]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].ticker, "AAPL");
        assert_eq!(merged[1].ticker, "MSFT");
    }

    #[test]
    fn test_incomplete_items_dropped() {
        let merged = merge(&[result(
            "AAPL",
            vec![
                item("AAPL", "", "No url"),
                item("AAPL", "https://a.com/1", "   "),
                item("", "https://a.com/2", "No ticker"),
                item("AAPL", "https://a.com/3", "Kept"),
            ],
        )]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].headline, "Kept");
    }

    #[test]
    fn test_order_is_ticker_then_page() {
        let merged = merge(&[
            result("AAPL", vec![item("AAPL", "https://a.com/2", "b"), item("AAPL", "https://a.com/1", "a")]),
            result("MSFT", vec![item("MSFT", "https://a.com/3", "c")]),
        ]);
        let urls: Vec<_> = merged.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/2", "https://a.com/1", "https://a.com/3"]);
    }

    #[test]
    fn test_normalize_fields() {
        let mut raw = item(" aapl ", " https://a.com/1 ", "  Apple\n  rallies  ");
        raw.source = "  ".to_string();
        let n = normalize(&raw);
        assert_eq!(n.ticker, "AAPL");
        assert_eq!(n.url, "https://a.com/1");
        assert_eq!(n.headline, "Apple rallies");
        assert_eq!(n.source, SENTINEL);
        assert_eq!(n.article_timestamp_raw, "1 hour ago");
    }
}
