//! Per-node extraction of a [`NewsItem`].
//!
//! A candidate node must contain a headline and a link; anything else is
//! optional. Source and publication time come from a single meta line such
//! as `Reuters • 2 hours ago`, split by [`parse_meta`].
//!
//! # Meta line heuristic
//!
//! The meta line has no stable format. The first fragment is taken as the
//! source whenever it looks plausible, even when it is the only fragment,
//! so a lone `2 hours ago` lands in both `source` and
//! `article_timestamp_raw`. A publisher whose name starts with "Ad" is
//! rejected as an ad marker, and a lone publisher name containing `/` or
//! `:` also reads as a time. Treat `source` and `article_timestamp_raw` as
//! hints, not facts.

use crate::models::{NewsItem, SENTINEL};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

static HEADLINE: Lazy<[Selector; 2]> = Lazy::new(|| {
    [
        Selector::parse(r#"h3[class*="clamp"]"#).unwrap(),
        Selector::parse("h3").unwrap(),
    ]
});

static LINK: Lazy<[Selector; 2]> = Lazy::new(|| {
    [
        Selector::parse(r#"a[class*="titles"][href]"#).unwrap(),
        Selector::parse("a[href]").unwrap(),
    ]
});

static META: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"div[class*="publishing"]"#).unwrap());

static TEMPORAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(ago|yesterday|just now)\b|[:/]").unwrap());

const META_SEPARATOR: char = '•';

/// Why a candidate node produced no item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    NoHeadline,
    NoLink,
}

/// Source and raw timestamp pulled out of a meta line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub source: String,
    pub timestamp_raw: String,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            source: SENTINEL.to_string(),
            timestamp_raw: SENTINEL.to_string(),
        }
    }
}

fn first_match<'a>(node: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| node.select(s).next())
}

fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Extract one item from a candidate node, stamped with `scraped_at`.
///
/// # Arguments
///
/// * `node` - A container returned by `find_candidates`
/// * `ticker` - The ticker the page belongs to
/// * `base` - Site origin used to resolve relative links
/// * `scraped_at` - Read time shared by every item from the same snapshot
///
/// # Returns
///
/// The item, or the [`Skip`] reason when the node has no headline or no
/// link. Missing meta fields are the sentinel, never an error.
pub fn extract(
    node: ElementRef<'_>,
    ticker: &str,
    base: &Url,
    scraped_at: DateTime<Utc>,
) -> Result<NewsItem, Skip> {
    let headline = first_match(node, &*HEADLINE)
        .map(collapsed_text)
        .filter(|h| !h.is_empty())
        .ok_or(Skip::NoHeadline)?;

    let href = first_match(node, &*LINK)
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(Skip::NoLink)?;

    let meta = node
        .select(&META)
        .next()
        .map(|div| parse_meta(&meta_text(div)))
        .unwrap_or_default();

    Ok(NewsItem {
        ticker: ticker.to_string(),
        headline,
        url: absolutize(href, base),
        source: meta.source,
        article_timestamp_raw: meta.timestamp_raw,
        scraped_at,
    })
}

/// Text fragments of the meta element joined by the separator, so sibling
/// spans split the same way as an inline bullet.
fn meta_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" • ")
}

/// Links that do not start with `http` are resolved against the site origin.
pub fn absolutize(href: &str, base: &Url) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    match base.join(href) {
        Ok(u) => u.to_string(),
        Err(_) => format!("{}{}", base.as_str().trim_end_matches('/'), href),
    }
}

fn plausible_source(s: &str) -> bool {
    let len = s.chars().count();
    (2..50).contains(&len) && !s.to_lowercase().starts_with("ad")
}

/// Split a `source • time` line. See the module docs for the failure modes.
pub fn parse_meta(text: &str) -> Meta {
    let parts: Vec<&str> = text
        .split(META_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut meta = Meta::default();
    if let Some(first) = parts.first().filter(|p| plausible_source(p)) {
        meta.source = first.to_string();
    }
    match parts.as_slice() {
        [only] if TEMPORAL.is_match(only) => meta.timestamp_raw = only.to_string(),
        [_, time, ..] => meta.timestamp_raw = time.to_string(),
        _ => {}
    }
    meta
}
