use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::CredentialsConfig;
use crate::error::{Result, ScraperError};

const LOGIN_URL: &str = "https://twitter.com/login";
const WINDOW_WIDTH: u32 = 1200;
const WINDOW_HEIGHT: u32 = 800;
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const USERNAME_FIELD_TIMEOUT: Duration = Duration::from_secs(15);
const PASSWORD_FIELD_TIMEOUT: Duration = Duration::from_secs(10);
const LOGGED_IN_TIMEOUT: Duration = Duration::from_secs(15);

/// One authenticated browser session against x.com.
///
/// The session is the single shared resource of a run: acquired once before
/// the first list, closed exactly once at the end. The pipeline guarantees
/// `close()` runs on every exit path.
pub struct TwitterSession {
    browser: Browser,
    page: Page,
}

impl TwitterSession {
    /// Launch a headless browser with a fixed window size.
    pub async fn launch() -> Result<Self> {
        let mut browser = Self::create_browser().await?;
        let page = match tokio::time::timeout(
            Duration::from_secs(10),
            browser.new_page("about:blank"),
        )
        .await
        {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                let _ = browser.close().await;
                return Err(
                    ScraperError::BrowserError(format!("Failed to create page: {}", e)).into(),
                );
            }
            Err(_) => {
                let _ = browser.close().await;
                return Err(
                    ScraperError::BrowserError("Timeout creating page".to_string()).into(),
                );
            }
        };

        Ok(Self { browser, page })
    }

    async fn create_browser() -> Result<Browser> {
        // unique user data dir to avoid singleton lock issues
        let user_data_dir = format!(
            "/tmp/twitter-list-scraper-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        );
        let _ = std::fs::create_dir_all(&user_data_dir);

        let browser_config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .args(vec![
                &format!("--user-data-dir={}", user_data_dir),
                "--headless",
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--mute-audio",
                "--no-first-run",
                "--disable-default-apps",
                "--disable-sync",
                "--disable-blink-features=AutomationControlled",
                "--log-level=3",
            ])
            .build()
            .map_err(|e| {
                ScraperError::BrowserError(format!("Failed to create browser config: {}", e))
            })?;

        // Retry browser launch up to 3 times
        let mut last_error = None;
        for attempt in 1..=3 {
            match Browser::launch(browser_config.clone()).await {
                Ok((browser, handler)) => {
                    info!("Browser launched successfully on attempt {}", attempt);

                    tokio::spawn(async move {
                        let mut handler = handler;
                        while let Some(h) = handler.next().await {
                            if let Err(e) = h {
                                // filter out common websocket deserialization errors
                                let error_msg = e.to_string();
                                if error_msg.contains("data did not match any variant")
                                    || error_msg.contains("untagged enum Message")
                                {
                                    debug!("Ignoring WebSocket deserialization error: {}", e);
                                } else {
                                    warn!("Browser handler error: {}", e);
                                }
                            }
                        }
                        debug!("Browser handler task ended");
                    });

                    return Ok(browser);
                }
                Err(e) => {
                    error!("Browser launch attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < 3 {
                        sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }

        Err(ScraperError::BrowserError(format!(
            "Failed to launch browser after 3 attempts: {}",
            last_error.unwrap()
        ))
        .into())
    }

    /// Log in with the configured credentials.
    ///
    /// Every wait here is fatal on timeout: there is no fallback credential
    /// path, and the pipeline stops when login cannot complete.
    pub async fn login(&self, credentials: &CredentialsConfig) -> Result<()> {
        info!("Navigating to login page");
        self.page
            .goto(LOGIN_URL)
            .await
            .map_err(|e| ScraperError::LoginError(format!("Failed to open login page: {}", e)))?;

        let username_field = self
            .wait_for_element(r#"input[name="text"]"#, USERNAME_FIELD_TIMEOUT)
            .await?;
        username_field
            .click()
            .await
            .map_err(|e| ScraperError::LoginError(format!("Username field not usable: {}", e)))?;
        username_field
            .type_str(&credentials.username)
            .await
            .map_err(|e| ScraperError::LoginError(format!("Failed to type username: {}", e)))?;
        self.click_span_with_text("Avançar").await?;

        let password_field = self
            .wait_for_element(r#"input[name="password"]"#, PASSWORD_FIELD_TIMEOUT)
            .await?;
        password_field
            .click()
            .await
            .map_err(|e| ScraperError::LoginError(format!("Password field not usable: {}", e)))?;
        password_field
            .type_str(&credentials.password)
            .await
            .map_err(|e| ScraperError::LoginError(format!("Failed to type password: {}", e)))?;
        self.click_span_with_text("Entrar").await?;

        // the home timeline column appearing is the logged-in signal
        self.wait_for_element(r#"div[data-testid="primaryColumn"]"#, LOGGED_IN_TIMEOUT)
            .await?;

        info!("Login completed for {}", credentials.username);
        Ok(())
    }

    // confirmation buttons carry no stable attribute, only their visible label
    async fn click_span_with_text(&self, label: &str) -> Result<()> {
        let xpath = format!(r#"//span[text()="{}"]"#, label);
        let button = self
            .wait_for_xpath(&xpath, PASSWORD_FIELD_TIMEOUT)
            .await
            .map_err(|e| ScraperError::LoginError(format!("Button '{}' not found: {}", label, e)))?;
        button
            .click()
            .await
            .map_err(|e| ScraperError::LoginError(format!("Failed to click '{}': {}", label, e)))?;
        Ok(())
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| ScraperError::BrowserError(format!("Failed to navigate to {}: {}", url, e)))?;
        Ok(())
    }

    /// Poll for an element until it appears or the bounded timeout elapses.
    pub async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(ScraperError::BrowserError(format!(
                            "Timed out after {:?} waiting for '{}': {}",
                            timeout, selector, e
                        ))
                        .into());
                    }
                    sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn wait_for_xpath(&self, xpath: &str, timeout: Duration) -> Result<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_xpath(xpath).await {
                Ok(element) => return Ok(element),
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(ScraperError::BrowserError(format!(
                            "Timed out after {:?} waiting for xpath '{}': {}",
                            timeout, xpath, e
                        ))
                        .into());
                    }
                    sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Issue one fixed-distance scroll to trigger lazy-loaded content.
    pub async fn scroll_to(&self, distance: u32) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollTo(0, {})", distance))
            .await
            .map_err(|e| ScraperError::BrowserError(format!("Scroll failed: {}", e)))?;
        Ok(())
    }

    /// Snapshot the rendered DOM as HTML.
    pub async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScraperError::BrowserError(format!("Failed to get page content: {}", e)))
            .map_err(Into::into)
    }

    /// Close the page and the browser process.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.page.close().await {
            warn!("Failed to close page: {}", e);
        }
        self.browser
            .close()
            .await
            .map_err(|e| ScraperError::BrowserError(format!("Failed to close browser: {}", e)))?;
        let _ = self.browser.wait().await;
        info!("Browser session closed");
        Ok(())
    }
}
