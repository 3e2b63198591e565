//! Where the ticker list comes from.
//!
//! A run fetches news for either a manual list, a fixed "big shots" list,
//! every S&P 500 constituent, or the first N constituents. Constituents are
//! scraped from the Wikipedia list page and rewritten to the quote-site form
//! (`BRK.B` becomes `BRK-B`).

use crate::error::ScrapeError;
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument, warn};

pub const SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

pub const BIG_SHOTS: [&str; 10] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "TSLA", "META", "BRK-B", "JPM", "V",
];

static CONSTITUENTS_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table#constituents").unwrap());
static WIKITABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table.wikitable").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static HEADER_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerSelection {
    List(Vec<String>),
    BigShots,
    Sp500,
    Top(usize),
}

/// Split a comma-separated list into uppercase symbols, dropping blanks and
/// repeats.
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .unique()
        .collect()
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Symbols from the constituents table, in table order.
pub fn parse_constituents(html: &str) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    let table = document
        .select(&CONSTITUENTS_TABLE)
        .next()
        .or_else(|| document.select(&WIKITABLE).next())
        .ok_or_else(|| ScrapeError::Data("no constituents table found".to_string()))?;

    let mut rows = table.select(&ROW);
    let header = rows
        .next()
        .ok_or_else(|| ScrapeError::Data("constituents table is empty".to_string()))?;
    let symbol_col = header
        .select(&HEADER_CELL)
        .position(|th| cell_text(th).eq_ignore_ascii_case("symbol"))
        .ok_or_else(|| ScrapeError::Data("no Symbol column in constituents table".to_string()))?;

    let symbols: Vec<String> = rows
        .filter_map(|row| row.select(&CELL).nth(symbol_col))
        .map(cell_text)
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('.', "-"))
        .unique()
        .collect();

    if symbols.is_empty() {
        return Err(ScrapeError::Data("constituents table has no symbols".to_string()));
    }
    Ok(symbols)
}

#[instrument(level = "info", skip(client))]
pub async fn fetch_sp500(client: &Client, url: &str) -> Result<Vec<String>, ScrapeError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let html = resp.text().await?;
    let symbols = parse_constituents(&html)?;
    info!(count = symbols.len(), "Fetched S&P 500 constituents");
    Ok(symbols)
}

/// Turn a selection into a concrete ticker list.
pub async fn resolve(
    selection: &TickerSelection,
    client: &Client,
    sp500_url: &str,
) -> Result<Vec<String>, ScrapeError> {
    let tickers = match selection {
        TickerSelection::List(list) => list.clone(),
        TickerSelection::BigShots => BIG_SHOTS.iter().map(|s| s.to_string()).collect(),
        TickerSelection::Sp500 => fetch_sp500(client, sp500_url).await?,
        TickerSelection::Top(n) => {
            let mut all = fetch_sp500(client, sp500_url).await?;
            if *n > all.len() {
                warn!(requested = n, available = all.len(), "Fewer constituents than requested");
            }
            all.truncate(*n);
            all
        }
    };
    if tickers.is_empty() {
        return Err(ScrapeError::Config("no tickers to fetch".to_string()));
    }
    Ok(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const WIKI_PAGE: &str = r#"
        <html><body>
          <table class="wikitable sortable" id="constituents">
            <tbody>
              <tr><th>Symbol</th><th>Security</th><th>GICS Sector</th></tr>
              <tr><td><a href="/x">MMM</a></td><td>3M</td><td>Industrials</td></tr>
              <tr><td><a href="/x">AOS</a></td><td>A. O. Smith</td><td>Industrials</td></tr>
              <tr><td><a href="/x">BRK.B</a></td><td>Berkshire Hathaway</td><td>Financials</td></tr>
              <tr><td><a href="/x">BF.B</a></td><td>Brown-Forman</td><td>Consumer Staples</td></tr>
            </tbody>
          </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" aapl, MSFT,,aapl , brk-b "), vec!["AAPL", "MSFT", "BRK-B"]);
        assert!(parse_list(" , ").is_empty());
    }

    #[test]
    fn test_parse_constituents_rewrites_class_shares() {
        let symbols = parse_constituents(WIKI_PAGE).unwrap();
        assert_eq!(symbols, vec!["MMM", "AOS", "BRK-B", "BF-B"]);
    }

    #[test]
    fn test_parse_constituents_finds_symbol_column() {
        let html = r#"<table class="wikitable">
            <tr><th>Security</th><th>Symbol</th></tr>
            <tr><td>Apple</td><td>AAPL</td></tr>
        </table>"#;
        assert_eq!(parse_constituents(html).unwrap(), vec!["AAPL"]);
    }

    #[test]
    fn test_parse_constituents_without_table() {
        assert!(matches!(
            parse_constituents("<p>moved</p>"),
            Err(ScrapeError::Data(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_top_n() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/wiki/sp500");
            then.status(200).body(WIKI_PAGE);
        });

        let client = Client::new();
        let url = server.url("/wiki/sp500");
        let top = resolve(&TickerSelection::Top(3), &client, &url).await.unwrap();
        assert_eq!(top, vec!["MMM", "AOS", "BRK-B"]);

        let all = resolve(&TickerSelection::Sp500, &client, &url).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_resolve_sp500_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/wiki/sp500");
            then.status(500);
        });

        let err = resolve(&TickerSelection::Sp500, &Client::new(), &server.url("/wiki/sp500"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_resolve_static_lists() {
        let client = Client::new();
        let shots = resolve(&TickerSelection::BigShots, &client, SP500_URL).await.unwrap();
        assert_eq!(shots.len(), BIG_SHOTS.len());
        assert!(shots.contains(&"BRK-B".to_string()));

        let empty = resolve(&TickerSelection::List(vec![]), &client, SP500_URL).await;
        assert!(matches!(empty, Err(ScrapeError::Config(_))));
    }
}
