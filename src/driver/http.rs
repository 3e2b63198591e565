//! Plain HTTP page driver.
//!
//! One `GET` per page with a browser User-Agent, parsed with `scraper`.
//! Nothing is rendered, so the driver only sees the markup the server sends
//! on first load. It is the only driver that sees real HTTP statuses, which
//! is where the 503/429 → rate limited and 404 → not found mapping happens.

use super::{DriverFactory, PageDriver, WaitOutcome};
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Builds [`HttpDriver`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpDriverFactory {
    client: Client,
}

impl HttpDriverFactory {
    pub fn new(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client })
    }
}

impl DriverFactory for HttpDriverFactory {
    type Driver = HttpDriver;

    async fn acquire(&self) -> Result<HttpDriver, ScrapeError> {
        Ok(HttpDriver {
            client: self.client.clone(),
            body: None,
        })
    }
}

/// Static page driver holding the last fetched body.
#[derive(Debug)]
pub struct HttpDriver {
    client: Client,
    body: Option<String>,
}

impl HttpDriver {
    fn body(&self) -> Result<&str, ScrapeError> {
        self.body
            .as_deref()
            .ok_or_else(|| ScrapeError::Data("no page loaded".to_string()))
    }

    fn matches(&self, css: &str) -> Result<bool, ScrapeError> {
        let selector = Selector::parse(css)
            .map_err(|e| ScrapeError::Config(format!("bad selector `{css}`: {e}")))?;
        let document = Html::parse_document(self.body()?);
        Ok(document.select(&selector).next().is_some())
    }
}

impl PageDriver for HttpDriver {
    #[instrument(level = "info", skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        match status {
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS => {
                return Err(ScrapeError::RateLimited {
                    url: url.to_string(),
                    status: Some(status.as_u16()),
                });
            }
            StatusCode::NOT_FOUND => {
                return Err(ScrapeError::NotFound { url: url.to_string() });
            }
            s if !s.is_success() => {
                return Err(ScrapeError::Status {
                    status: s.as_u16(),
                    url: url.to_string(),
                });
            }
            _ => {}
        }

        let body = resp.text().await?;
        info!(bytes = body.len(), "Fetched page");
        self.body = Some(body);
        Ok(())
    }

    async fn click_if_present(&mut self, css: &str) -> Result<bool, ScrapeError> {
        // Nothing to click on a static document; the consent wall never
        // blocks the raw markup.
        debug!(css, "Static driver ignores clicks");
        Ok(false)
    }

    async fn wait_for(&mut self, css: &str, _timeout: Duration) -> Result<WaitOutcome, ScrapeError> {
        if self.matches(css)? {
            Ok(WaitOutcome::Ready)
        } else {
            Ok(WaitOutcome::Absent)
        }
    }

    async fn page_source(&mut self) -> Result<String, ScrapeError> {
        Ok(self.body()?.to_string())
    }

    async fn scroll_to_end(&mut self) -> Result<bool, ScrapeError> {
        Ok(false)
    }

    async fn release(self) -> Result<(), ScrapeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    async fn driver() -> HttpDriver {
        HttpDriverFactory::new(&ScrapeConfig::default())
            .unwrap()
            .acquire()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_503_maps_to_rate_limited() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/quote/AAPL/news");
            then.status(503).body("Service Unavailable");
        });

        let mut driver = driver().await;
        let err = driver
            .navigate(&server.url("/quote/AAPL/news"))
            .await
            .unwrap_err();

        mock.assert();
        match err {
            ScrapeError::RateLimited { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_429_maps_to_rate_limited() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote/MSFT/news");
            then.status(429);
        });

        let mut driver = driver().await;
        let err = driver
            .navigate(&server.url("/quote/MSFT/news"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::RateLimited { status: Some(429), .. }));
    }

    #[tokio::test]
    async fn test_404_maps_to_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote/ZZZZ/news");
            then.status(404).body("<html><body>Page not found</body></html>");
        });

        let mut driver = driver().await;
        let err = driver
            .navigate(&server.url("/quote/ZZZZ/news"))
            .await
            .unwrap_err();
        match err {
            ScrapeError::NotFound { url } => assert!(url.ends_with("/quote/ZZZZ/news")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_status_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote/AAPL/news");
            then.status(500);
        });

        let mut driver = driver().await;
        let err = driver
            .navigate(&server.url("/quote/AAPL/news"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_static_page_wait_and_source() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote/AAPL/news");
            then.status(200)
                .header("content-type", "text/html")
                .body(r#"<ul><li class="stream-item story-item"><h3>Hi</h3></li></ul>"#);
        });

        let mut driver = driver().await;
        driver
            .navigate(&server.url("/quote/AAPL/news"))
            .await
            .unwrap();

        let t = Duration::from_secs(1);
        assert_eq!(driver.wait_for("li.stream-item", t).await.unwrap(), WaitOutcome::Ready);
        assert_eq!(driver.wait_for("div.nothing", t).await.unwrap(), WaitOutcome::Absent);
        assert!(driver.page_source().await.unwrap().contains("story-item"));
        assert!(!driver.scroll_to_end().await.unwrap());
        assert!(!driver.click_if_present("button.reject-all").await.unwrap());
        driver.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_source_before_navigate_is_an_error() {
        let mut driver = driver().await;
        assert!(matches!(
            driver.page_source().await,
            Err(ScrapeError::Data(_))
        ));
    }
}
