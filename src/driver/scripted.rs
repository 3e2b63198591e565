//! In-memory driver for session and orchestrator tests.
//!
//! Each ticker gets a [`Script`]: what navigation does, what the ready wait
//! returns, and the page source after 0, 1, 2… scrolls.

use super::{DriverFactory, PageDriver, WaitOutcome};
use crate::error::ScrapeError;
use crate::models::FetchStatus;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Script {
    /// Page source after n scrolls; the last entry repeats.
    pub pages: Vec<String>,
    pub wait: WaitOutcome,
    pub navigate_error: Option<FetchStatus>,
    pub navigate_delay: Duration,
    pub can_scroll: bool,
}

impl Script {
    pub fn pages(pages: Vec<String>) -> Self {
        Self {
            pages,
            wait: WaitOutcome::Ready,
            navigate_error: None,
            navigate_delay: Duration::ZERO,
            can_scroll: true,
        }
    }

    pub fn timing_out() -> Self {
        Self {
            wait: WaitOutcome::TimedOut,
            ..Self::pages(vec!["<html><body><div id=\"spinner\"></div></body></html>".to_string()])
        }
    }

    pub fn failing(status: FetchStatus) -> Self {
        Self {
            navigate_error: Some(status),
            ..Self::pages(Vec::new())
        }
    }
}

/// Build a news page with `n` story items numbered from `start`.
pub fn story_page(ticker: &str, start: usize, n: usize) -> String {
    let items: String = (start..start + n)
        .map(|i| {
            format!(
                r#"<li class="stream-item story-item"><a class="titles" href="/news/{t}-{i}.html"><h3 class="clamp">{t} story {i}</h3></a><div class="publishing">Reuters • {i} hours ago</div></li>"#,
                t = ticker.to_lowercase()
            )
        })
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

#[derive(Debug, Default, Clone)]
pub struct ScriptedFactory {
    scripts: Arc<HashMap<String, Script>>,
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(scripts: Vec<(&str, Script)>) -> Self {
        Self {
            scripts: Arc::new(
                scripts
                    .into_iter()
                    .map(|(t, s)| (t.to_string(), s))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

impl DriverFactory for ScriptedFactory {
    type Driver = ScriptedDriver;

    async fn acquire(&self) -> Result<ScriptedDriver, ScrapeError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedDriver {
            scripts: Arc::clone(&self.scripts),
            released: Arc::clone(&self.released),
            script: None,
            scrolls: 0,
            clicked: Vec::new(),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedDriver {
    scripts: Arc<HashMap<String, Script>>,
    released: Arc<AtomicUsize>,
    script: Option<Script>,
    pub scrolls: usize,
    pub clicked: Vec<String>,
}

impl ScriptedDriver {
    pub fn with_script(script: Script) -> Self {
        Self {
            scripts: Arc::new(HashMap::new()),
            released: Arc::new(AtomicUsize::new(0)),
            script: Some(script),
            scrolls: 0,
            clicked: Vec::new(),
        }
    }

    fn script(&self) -> Result<&Script, ScrapeError> {
        self.script
            .as_ref()
            .ok_or_else(|| ScrapeError::Data("no page loaded".to_string()))
    }
}

impl PageDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        if self.script.is_none() {
            let found = self
                .scripts
                .iter()
                .find(|(ticker, _)| url.contains(&format!("/quote/{ticker}/")))
                .map(|(_, s)| s.clone());
            self.script = found;
        }
        let script = self.script()?.clone();
        tokio::time::sleep(script.navigate_delay).await;
        match script.navigate_error {
            None => Ok(()),
            Some(FetchStatus::RateLimited) => Err(ScrapeError::RateLimited {
                url: url.to_string(),
                status: Some(503),
            }),
            Some(FetchStatus::NotFound) => Err(ScrapeError::NotFound { url: url.to_string() }),
            Some(FetchStatus::Timeout) => Err(ScrapeError::Timeout { stage: "navigation" }),
            Some(_) => Err(ScrapeError::Data("connection reset".to_string())),
        }
    }

    async fn click_if_present(&mut self, css: &str) -> Result<bool, ScrapeError> {
        self.clicked.push(css.to_string());
        Ok(false)
    }

    async fn wait_for(&mut self, _css: &str, _timeout: Duration) -> Result<WaitOutcome, ScrapeError> {
        Ok(self.script()?.wait)
    }

    async fn page_source(&mut self) -> Result<String, ScrapeError> {
        let pages = &self.script()?.pages;
        pages
            .get(self.scrolls.min(pages.len().saturating_sub(1)))
            .cloned()
            .ok_or_else(|| ScrapeError::Data("script has no pages".to_string()))
    }

    async fn scroll_to_end(&mut self) -> Result<bool, ScrapeError> {
        if self.script()?.can_scroll {
            self.scrolls += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn release(self) -> Result<(), ScrapeError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
