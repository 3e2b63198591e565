//! Error type shared by the drivers, the page session and the setup code.
//!
//! Every failure that can end a ticker's session maps onto one
//! [`FetchStatus`] through [`ScrapeError::status`], so the orchestrator can
//! record it in the ticker's [`FetchResult`](crate::models::FetchResult)
//! instead of propagating it.

use crate::models::FetchStatus;
use thiserror::Error;

/// Errors raised while configuring a run or driving a page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport-level failure from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote site answered with 503/429 or served its rate-limit page.
    #[error("rate limited at {url} (status {status:?})")]
    RateLimited { url: String, status: Option<u16> },

    /// The news page does not exist for this ticker.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Any other non-success HTTP status.
    #[error("unexpected response status: {status} at {url}")]
    Status { status: u16, url: String },

    /// A bounded wait expired.
    #[error("timed out during {stage}")]
    Timeout { stage: &'static str },

    /// The WebDriver endpoint returned a protocol error.
    #[error("webdriver error `{error}`: {message}")]
    WebDriver { error: String, message: String },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Data came back in a shape we could not use.
    #[error("data format unexpected: {0}")]
    Data(String),
}

impl ScrapeError {
    /// Terminal status a ticker gets when its session ends with this error.
    pub fn status(&self) -> FetchStatus {
        match self {
            ScrapeError::RateLimited { .. } => FetchStatus::RateLimited,
            ScrapeError::NotFound { .. } => FetchStatus::NotFound,
            ScrapeError::Timeout { .. } => FetchStatus::Timeout,
            ScrapeError::Http(e) if e.is_timeout() => FetchStatus::Timeout,
            ScrapeError::WebDriver { error, .. } if error == "timeout" => FetchStatus::Timeout,
            _ => FetchStatus::UnexpectedError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let rl = ScrapeError::RateLimited {
            url: "https://finance.yahoo.com/quote/AAPL/news".to_string(),
            status: Some(503),
        };
        assert_eq!(rl.status(), FetchStatus::RateLimited);
        assert!(rl.to_string().contains("Some(503)"));

        let nf = ScrapeError::NotFound {
            url: "https://finance.yahoo.com/quote/ZZZZ/news".to_string(),
        };
        assert_eq!(nf.status(), FetchStatus::NotFound);

        assert_eq!(
            ScrapeError::Timeout { stage: "content wait" }.status(),
            FetchStatus::Timeout
        );
        assert_eq!(
            ScrapeError::WebDriver {
                error: "timeout".to_string(),
                message: "page load".to_string()
            }
            .status(),
            FetchStatus::Timeout
        );
    }

    #[test]
    fn test_everything_else_is_unexpected() {
        assert_eq!(
            ScrapeError::Status {
                status: 500,
                url: "https://example.com".to_string()
            }
            .status(),
            FetchStatus::UnexpectedError
        );
        assert_eq!(
            ScrapeError::Data("no sessionId".to_string()).status(),
            FetchStatus::UnexpectedError
        );
        assert_eq!(
            ScrapeError::WebDriver {
                error: "no such window".to_string(),
                message: String::new()
            }
            .status(),
            FetchStatus::UnexpectedError
        );
    }
}
