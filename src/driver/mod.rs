//! Page drivers: the browser-ish handle a page session talks to.
//!
//! A [`PageSession`](crate::scrapers::session::PageSession) never touches the
//! network itself. It drives a [`PageDriver`] that it borrows from the
//! orchestrator, which acquires one per ticker from a [`DriverFactory`] and
//! releases it after the session ends, whichever way it ended.
//!
//! | Driver | Module | Renders JS | Scrolls | Sees HTTP status |
//! |--------|--------|------------|---------|------------------|
//! | Plain HTTP | [`http`] | no | no | yes |
//! | W3C WebDriver | [`webdriver`] | yes | yes | no |

use crate::error::ScrapeError;
use std::time::Duration;

pub mod http;
pub mod webdriver;

#[cfg(test)]
pub mod scripted;

/// Result of waiting for a selector to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The selector matched.
    Ready,
    /// The document is complete and static, and the selector does not match.
    /// Waiting longer cannot change that.
    Absent,
    /// The selector did not match before the timeout.
    TimedOut,
}

/// A single page/browser context, exclusively owned by one session.
pub trait PageDriver {
    /// Load `url`. Errors here are fatal for the session.
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Click the first element matching `css`. `Ok(false)` when nothing matches.
    async fn click_if_present(&mut self, css: &str) -> Result<bool, ScrapeError>;

    /// Wait until `css` matches something, up to `timeout`.
    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<WaitOutcome, ScrapeError>;

    /// Current DOM serialized as HTML.
    async fn page_source(&mut self) -> Result<String, ScrapeError>;

    /// Trigger the site's "load more" by scrolling to the end of the page.
    /// Returns `Ok(false)` when this driver cannot scroll, so no new content
    /// will ever appear.
    async fn scroll_to_end(&mut self) -> Result<bool, ScrapeError>;

    /// Tear down the page context.
    async fn release(self) -> Result<(), ScrapeError>
    where
        Self: Sized;
}

/// Hands out one fresh [`PageDriver`] per ticker session.
pub trait DriverFactory {
    type Driver: PageDriver;

    async fn acquire(&self) -> Result<Self::Driver, ScrapeError>;
}
