//! W3C WebDriver page driver.
//!
//! Talks the WebDriver JSON wire protocol over HTTP to an already running
//! endpoint (`chromedriver --port=9515`, `geckodriver`, a Selenium grid).
//! Each acquired driver is one browser session, created in
//! [`WebDriverFactory::acquire`] and deleted in [`PageDriver::release`].
//!
//! Only the handful of commands the page session needs are implemented:
//! new session, timeouts, navigate, find element, click, page source,
//! execute script, delete session.

use super::{DriverFactory, PageDriver, WaitOutcome};
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

/// Key the W3C protocol uses for element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight); return true;";

/// Browser requested from the WebDriver endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Browser {
    Chrome,
    Firefox,
}

/// Opens one browser session per [`acquire`](DriverFactory::acquire).
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    client: Client,
    endpoint: String,
    browser: Browser,
    headless: bool,
    user_agent: String,
    page_load_timeout: Duration,
}

impl WebDriverFactory {
    pub fn new(
        endpoint: &str,
        browser: Browser,
        headless: bool,
        config: &ScrapeConfig,
    ) -> Result<Self, ScrapeError> {
        // Navigation blocks until the page load timeout, so the HTTP timeout
        // must outlast it.
        let client = Client::builder()
            .timeout(config.request_timeout() + config.page_load_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            browser,
            headless,
            user_agent: config.user_agent.clone(),
            page_load_timeout: config.page_load_timeout(),
        })
    }

    fn capabilities(&self) -> Value {
        match self.browser {
            Browser::Chrome => {
                let mut args = vec![
                    "--disable-gpu".to_string(),
                    format!("--user-agent={}", self.user_agent),
                ];
                if self.headless {
                    args.push("--headless=new".to_string());
                }
                json!({
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                })
            }
            Browser::Firefox => {
                let args: Vec<&str> = if self.headless { vec!["-headless"] } else { vec![] };
                json!({
                    "browserName": "firefox",
                    "moz:firefoxOptions": {
                        "args": args,
                        "prefs": { "general.useragent.override": self.user_agent }
                    }
                })
            }
        }
    }
}

impl DriverFactory for WebDriverFactory {
    type Driver = WebDriverSession;

    #[instrument(level = "info", skip(self), fields(endpoint = %self.endpoint))]
    async fn acquire(&self) -> Result<WebDriverSession, ScrapeError> {
        let body = json!({ "capabilities": { "alwaysMatch": self.capabilities() } });
        let value = command(&self.client, Method::POST, &format!("{}/session", self.endpoint), Some(body)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ScrapeError::Data("new session response has no sessionId".to_string()))?
            .to_string();
        info!(%session_id, "Opened browser session");

        let session = WebDriverSession {
            client: self.client.clone(),
            base: format!("{}/session/{}", self.endpoint, session_id),
            session_id,
        };
        let timeouts = json!({ "pageLoad": self.page_load_timeout.as_millis() as u64 });
        if let Err(e) = session.call(Method::POST, "/timeouts", Some(timeouts)).await {
            warn!(error = %e, "Failed to set page load timeout; closing session");
            if let Err(close) = session.release().await {
                warn!(error = %close, "Failed to close browser session");
            }
            return Err(e);
        }
        Ok(session)
    }
}

/// One open browser session.
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    session_id: String,
    base: String,
}

impl WebDriverSession {
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ScrapeError> {
        command(&self.client, method, &format!("{}{}", self.base, path), body).await
    }

    /// Element id of the first match, `None` when nothing matches.
    async fn find(&self, css: &str) -> Result<Option<String>, ScrapeError> {
        let body = json!({ "using": "css selector", "value": css });
        match self.call(Method::POST, "/element", Some(body)).await {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| ScrapeError::Data("element response has no reference".to_string())),
            Err(ScrapeError::WebDriver { error, .. }) if error == "no such element" => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl PageDriver for WebDriverSession {
    #[instrument(level = "info", skip(self), fields(session_id = %self.session_id))]
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.call(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    async fn click_if_present(&mut self, css: &str) -> Result<bool, ScrapeError> {
        let Some(id) = self.find(css).await? else {
            return Ok(false);
        };
        match self.call(Method::POST, &format!("/element/{id}/click"), Some(json!({}))).await {
            Ok(_) => Ok(true),
            // Present but hidden or covered; treat like absent.
            Err(ScrapeError::WebDriver { error, message })
                if error == "element not interactable" || error == "element click intercepted" =>
            {
                debug!(css, %message, "Element not clickable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<WaitOutcome, ScrapeError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.find(css).await?.is_some() {
                return Ok(WaitOutcome::Ready);
            }
            if Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn page_source(&mut self) -> Result<String, ScrapeError> {
        let value = self.call(Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScrapeError::Data("page source is not a string".to_string()))
    }

    async fn scroll_to_end(&mut self) -> Result<bool, ScrapeError> {
        let body = json!({ "script": SCROLL_SCRIPT, "args": [] });
        self.call(Method::POST, "/execute/sync", Some(body)).await?;
        Ok(true)
    }

    #[instrument(level = "info", skip(self), fields(session_id = %self.session_id))]
    async fn release(self) -> Result<(), ScrapeError> {
        self.call(Method::DELETE, "", None).await?;
        info!("Closed browser session");
        Ok(())
    }
}

/// Send one WebDriver command and unwrap the `value` member of the reply.
async fn command(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, ScrapeError> {
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await?;
    let status = resp.status();
    let mut payload: Value = resp.json().await?;
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ScrapeError::WebDriver { error, message });
    }
    Ok(value)
}
