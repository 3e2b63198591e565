//! One ticker's news page, from navigation to the final item list.
//!
//! ```text
//! Idle → Loading → ConsentCheck → ContentWait → Scrolling → Extracting → Done
//!   └──────────┴────────────┴─────────────┴───────────┴──────────→ Error(status)
//! ```
//!
//! Only navigation failures, the site's rate-limit and unknown-symbol
//! pages, and the content wait timing out end the session with an error. A node that fails to
//! extract is counted and skipped; a failing scroll stops pagination but
//! keeps what was collected.

use crate::config::ScrapeConfig;
use crate::driver::{PageDriver, WaitOutcome};
use crate::error::ScrapeError;
use crate::models::{FetchStatus, NewsItem};
use crate::scrapers::extract::{Skip, extract};
use crate::scrapers::selectors::{find_candidates, has_text_marker};
use chrono::Utc;
use scraper::Html;
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    ConsentCheck,
    ContentWait,
    Scrolling,
    Extracting,
    Done,
    Error(FetchStatus),
}

/// What a finished session collected.
#[derive(Debug, Default)]
pub struct PageHarvest {
    /// Items in scan order, at most `target_item_count`.
    pub items: Vec<NewsItem>,
    /// The page showed the site's "no news" message.
    pub no_news: bool,
    pub strategy: Option<&'static str>,
    pub skipped_nodes: usize,
    /// Page reads performed by the scroll loop.
    pub attempts: usize,
}

/// Outcome of reading the current DOM once.
struct PageRead {
    new_items: Vec<NewsItem>,
    candidates: usize,
    skipped: usize,
    strategy: Option<&'static str>,
    /// Read from the first node because the matching strategy changed.
    restarted: bool,
    no_news: bool,
}

pub struct PageSession<'a, D: PageDriver> {
    driver: &'a mut D,
    config: &'a ScrapeConfig,
    base: &'a Url,
    ticker: &'a str,
    state: SessionState,
    history: Vec<SessionState>,
}

impl<'a, D: PageDriver> PageSession<'a, D> {
    pub fn new(driver: &'a mut D, config: &'a ScrapeConfig, base: &'a Url, ticker: &'a str) -> Self {
        Self {
            driver,
            config,
            base,
            ticker,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    fn transition(&mut self, next: SessionState) {
        debug!(ticker = %self.ticker, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
        self.history.push(next);
    }

    /// Drive the page at `url` to completion.
    #[instrument(level = "info", skip(self), fields(ticker = %self.ticker))]
    pub async fn run(&mut self, url: &str) -> Result<PageHarvest, ScrapeError> {
        match self.drive(url).await {
            Ok(harvest) => {
                self.transition(SessionState::Done);
                Ok(harvest)
            }
            Err(e) => {
                let failed_in = self.state();
                self.transition(SessionState::Error(e.status()));
                debug!(?failed_in, history = ?self.history(), error = %e, "Session failed");
                Err(e)
            }
        }
    }

    async fn drive(&mut self, url: &str) -> Result<PageHarvest, ScrapeError> {
        self.transition(SessionState::Loading);
        self.driver.navigate(url).await?;
        let landing = self.driver.page_source().await?;
        if let Some(e) = self.error_page(&Html::parse_document(&landing), url) {
            return Err(e);
        }

        self.transition(SessionState::ConsentCheck);
        self.dismiss_interstitials().await;

        self.transition(SessionState::ContentWait);
        let ready = self
            .driver
            .wait_for(&self.config.content_ready_selector, self.config.page_load_timeout())
            .await?;
        match ready {
            WaitOutcome::Ready => {
                debug!("News list present");
                sleep(self.config.initial_settle()).await;
            }
            WaitOutcome::Absent => {
                debug!("Static page without news list; reading once");
            }
            WaitOutcome::TimedOut => {
                let document = Html::parse_document(&self.driver.page_source().await?);
                if let Some(e) = self.error_page(&document, url) {
                    return Err(e);
                }
                if has_text_marker(&document, &self.config.no_news_marker) {
                    info!("Page reports no news");
                    self.transition(SessionState::Extracting);
                    return Ok(PageHarvest {
                        no_news: true,
                        ..Default::default()
                    });
                }
                warn!(timeout = ?self.config.page_load_timeout(), "News list never appeared");
                return Err(ScrapeError::Timeout { stage: "content wait" });
            }
        }

        self.transition(SessionState::Scrolling);
        let harvest = self.scroll().await?;

        self.transition(SessionState::Extracting);
        info!(
            items = harvest.items.len(),
            attempts = harvest.attempts,
            skipped = harvest.skipped_nodes,
            strategy = ?harvest.strategy,
            "Page harvested"
        );
        Ok(harvest)
    }

    /// The site's rate-limit or unknown-symbol page, served with a normal
    /// status and only recognisable by its visible text.
    fn error_page(&self, document: &Html, url: &str) -> Option<ScrapeError> {
        if has_text_marker(document, &self.config.rate_limit_marker) {
            warn!("Rate-limit page served");
            return Some(ScrapeError::RateLimited {
                url: url.to_string(),
                status: None,
            });
        }
        if has_text_marker(document, &self.config.not_found_marker) {
            info!("Unknown symbol page served");
            return Some(ScrapeError::NotFound { url: url.to_string() });
        }
        None
    }

    /// Consent wall and the optional jump-to-end button. Failing to click
    /// either is logged and ignored.
    async fn dismiss_interstitials(&mut self) {
        match self.driver.click_if_present(&self.config.consent_selector).await {
            Ok(true) => info!("Consent dialog dismissed"),
            Ok(false) => debug!("No consent dialog"),
            Err(e) => warn!(error = %e, "Could not dismiss consent dialog"),
        }
        if let Some(css) = &self.config.scroll_button_selector {
            match self.driver.click_if_present(css).await {
                Ok(true) => debug!("Clicked scroll-down button"),
                Ok(false) => {}
                Err(e) => debug!(error = %e, "Could not click scroll-down button"),
            }
        }
    }

    /// Read, extract new nodes, scroll, settle; at most `max_scroll_attempts`
    /// reads, stopping once `target_item_count` items are collected.
    async fn scroll(&mut self) -> Result<PageHarvest, ScrapeError> {
        let max_attempts = self.config.max_scroll_attempts;
        let target = self.config.target_item_count;
        let mut harvest = PageHarvest::default();
        let mut seen_urls = HashSet::new();
        let mut processed = 0;

        while harvest.attempts < max_attempts && harvest.items.len() < target {
            harvest.attempts += 1;
            let html = match self.driver.page_source().await {
                Ok(html) => html,
                Err(e) if harvest.attempts > 1 => {
                    warn!(attempt = harvest.attempts, error = %e, "Page read failed; keeping items so far");
                    break;
                }
                Err(e) => return Err(e),
            };

            let read = self.read_page(&html, harvest.strategy, processed);
            processed = if read.restarted {
                read.candidates
            } else {
                processed.max(read.candidates)
            };
            harvest.skipped_nodes += read.skipped;
            harvest.no_news |= read.no_news;
            harvest.strategy = read.strategy.or(harvest.strategy);

            for item in read.new_items {
                if harvest.items.len() >= target {
                    break;
                }
                if seen_urls.insert(item.url.clone()) {
                    harvest.items.push(item);
                }
            }
            debug!(
                attempt = harvest.attempts,
                candidates = read.candidates,
                total = harvest.items.len(),
                "Scroll attempt read"
            );

            if harvest.items.len() >= target || harvest.attempts >= max_attempts {
                break;
            }
            match self.driver.scroll_to_end().await {
                Ok(true) => sleep(self.config.settle_interval()).await,
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, "Scroll failed; stopping pagination");
                    break;
                }
            }
        }
        Ok(harvest)
    }

    /// Extract candidates past index `processed` from one page snapshot.
    /// When a different strategy matched than on the previous read, the
    /// old index means nothing and every node is read again.
    fn read_page(&self, html: &str, previous: Option<&'static str>, processed: usize) -> PageRead {
        let document = Html::parse_document(html);
        let candidates = find_candidates(&document);
        let scraped_at = Utc::now();
        let mut new_items = Vec::new();
        let mut skipped = 0;

        if candidates.is_empty() {
            debug!("No item containers matched");
        }
        let restarted =
            previous.is_some() && candidates.strategy.is_some() && candidates.strategy != previous;
        let start = if restarted {
            debug!(from = ?previous, to = ?candidates.strategy, "Selector strategy changed; rereading page");
            0
        } else {
            processed
        };

        for (i, node) in candidates.nodes.iter().enumerate().skip(start) {
            match extract(*node, self.ticker, self.base, scraped_at) {
                Ok(item) => new_items.push(item),
                Err(reason) => {
                    skipped += 1;
                    match reason {
                        Skip::NoHeadline => debug!(node = i, "Skipping node without headline"),
                        Skip::NoLink => debug!(node = i, "Skipping node without link"),
                    }
                }
            }
        }

        PageRead {
            new_items,
            candidates: candidates.len(),
            skipped,
            strategy: candidates.strategy,
            restarted,
            no_news: has_text_marker(&document, &self.config.no_news_marker),
        }
    }
}
