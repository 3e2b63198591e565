//! CSV persistence of the merged record set.
//!
//! Columns are fixed and the header is always written, even for an empty
//! run. Missing optional fields are already [`SENTINEL`] by the time items
//! get here and are written verbatim. Files start with a UTF-8 BOM so
//! spreadsheet tools pick the right encoding; the reader skips it.

use crate::error::ScrapeError;
use crate::models::{NewsItem, SENTINEL};
use chrono::{DateTime, SecondsFormat, Utc};
use std::mem::take;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const COLUMNS: [&str; 6] = [
    "ticker",
    "headline",
    "url",
    "source",
    "article_timestamp_raw",
    "scraped_timestamp",
];

const BOM: char = '\u{feff}';

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn push_row(out: &mut String, row: &[&str]) {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if needs_quotes(cell) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push_str("\r\n");
}

/// Render items as CSV text, header first.
pub fn to_csv_string(items: &[NewsItem]) -> String {
    let mut out = String::new();
    out.push(BOM);
    push_row(&mut out, &COLUMNS);
    for item in items {
        let scraped = item.scraped_at.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        push_row(
            &mut out,
            &[
                &item.ticker,
                &item.headline,
                &item.url,
                &item.source,
                &item.article_timestamp_raw,
                &scraped,
            ],
        );
    }
    out
}

/// Split CSV text into rows of fields. Tolerates CRLF and quoted newlines.
fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Parse CSV text produced by [`to_csv_string`].
pub fn from_csv_str(text: &str) -> Result<Vec<NewsItem>, ScrapeError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut rows = parse_rows(text).into_iter();

    let header = rows
        .next()
        .ok_or_else(|| ScrapeError::Data("CSV has no header".to_string()))?;
    if header != COLUMNS {
        return Err(ScrapeError::Data(format!("unexpected CSV header: {header:?}")));
    }

    rows.enumerate()
        .map(|(i, row)| -> Result<NewsItem, ScrapeError> {
            let [ticker, headline, url, source, ts_raw, scraped]: [String; 6] = row
                .try_into()
                .map_err(|r: Vec<String>| ScrapeError::Data(format!("row {} has {} fields", i + 1, r.len())))?;
            let scraped_at = DateTime::parse_from_rfc3339(&scraped)
                .map_err(|e| ScrapeError::Data(format!("row {}: bad scraped_timestamp: {e}", i + 1)))?
                .with_timezone(&Utc);
            Ok(NewsItem {
                ticker,
                headline,
                url,
                source: if source.is_empty() { SENTINEL.to_string() } else { source },
                article_timestamp_raw: if ts_raw.is_empty() { SENTINEL.to_string() } else { ts_raw },
                scraped_at,
            })
        })
        .collect()
}

#[instrument(level = "info", skip(items), fields(count = items.len()))]
pub async fn write_news_csv(items: &[NewsItem], path: &Path) -> Result<(), ScrapeError> {
    fs::write(path, to_csv_string(items)).await?;
    info!(path = %path.display(), "Wrote CSV");
    Ok(())
}

pub async fn read_news_csv(path: &Path) -> Result<Vec<NewsItem>, ScrapeError> {
    let text = fs::read_to_string(path).await?;
    from_csv_str(&text)
}

/// Read a written file back and check it holds exactly `items`.
#[instrument(level = "info", skip(items), fields(count = items.len()))]
pub async fn verify_news_csv(items: &[NewsItem], path: &Path) -> Result<(), ScrapeError> {
    let written = read_news_csv(path).await?;
    if written.len() != items.len() {
        return Err(ScrapeError::Data(format!(
            "{} holds {} rows, expected {}",
            path.display(),
            written.len(),
            items.len()
        )));
    }
    if let Some((row, _)) = written
        .iter()
        .zip(items)
        .enumerate()
        .find(|(_, (w, i))| w.ticker != i.ticker || w.url != i.url)
    {
        return Err(ScrapeError::Data(format!(
            "{} row {} does not match the merged item",
            path.display(),
            row + 1
        )));
    }
    info!(rows = written.len(), "CSV verified");
    Ok(())
}
