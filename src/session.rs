//! Browser session lifecycle.
//!
//! One session owns one browser instance and one tab, navigated to a single listing page.
//! Sessions are never shared between checks.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use playwright_rs::{Browser, LaunchOptions, Page, Playwright, Viewport};
use tracing::{info, warn};

use crate::catalog::ListingPage;
use crate::config::{BrowserKind, HarnessConfig, SessionConfig, WaitConfig};
use crate::error::HarnessResult;
use crate::wait::SettlePolicy;

/// Chromium switches derived from the session options
pub fn chromium_args(config: &SessionConfig) -> Vec<String> {
    let mut args = Vec::new();
    if config.disable_automation_signals {
        args.push("--disable-blink-features=AutomationControlled".to_string());
    }
    if config.allow_cross_origin {
        args.push("--disable-web-security".to_string());
    }
    if config.allow_local_file_access {
        args.push("--allow-file-access-from-files".to_string());
    }
    if config.maximized {
        args.push("--start-maximized".to_string());
    }
    args
}

/// A browser instance bound to one listing page
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Page,
    listing: ListingPage,
    url: String,
    config: SessionConfig,
    waits: WaitConfig,
}

impl BrowserSession {
    /// Launch a browser, open a tab and navigate to `listing` under `base_url`
    pub async fn open(
        playwright: &Playwright,
        base_url: &str,
        listing: &ListingPage,
        config: &HarnessConfig,
    ) -> HarnessResult<Self> {
        let session_config = &config.session;
        let browser_type = match session_config.browser {
            BrowserKind::Chromium => playwright.chromium(),
            BrowserKind::Firefox => playwright.firefox(),
            BrowserKind::Webkit => playwright.webkit(),
        };

        let mut options = LaunchOptions::new().headless(session_config.headless);
        if session_config.browser == BrowserKind::Chromium {
            options = options.args(chromium_args(session_config));
        }
        let browser = browser_type.launch_with_options(options).await?;

        let page = match browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                shut_down(&browser, "after failed tab setup").await;
                return Err(e.into());
            }
        };

        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            listing.path.trim_start_matches('/')
        );
        let mut session = Self {
            browser: Some(browser),
            page,
            listing: listing.clone(),
            url,
            config: session_config.clone(),
            waits: config.waits.clone(),
        };

        if let Err(e) = session.prepare().await {
            session.close().await;
            return Err(e);
        }

        info!(
            browser = session_config.browser.name(),
            url = %session.url,
            "browser session opened"
        );
        Ok(session)
    }

    async fn prepare(&self) -> HarnessResult<()> {
        if self.config.maximized {
            self.page
                .set_viewport_size(Viewport {
                    width: self.config.viewport_width as _,
                    height: self.config.viewport_height as _,
                })
                .await?;
        }
        self.page.goto(&self.url, None).await?;
        Ok(())
    }

    /// Open a session, run `body`, and close the browser on every exit path.
    ///
    /// A panic inside `body` is re-raised after the browser has been closed.
    pub async fn scoped<T, F>(
        playwright: &Playwright,
        base_url: &str,
        listing: &ListingPage,
        config: &HarnessConfig,
        body: F,
    ) -> HarnessResult<T>
    where
        F: for<'a> FnOnce(&'a BrowserSession) -> LocalBoxFuture<'a, HarnessResult<T>>,
    {
        let mut session = Self::open(playwright, base_url, listing, config).await?;
        let outcome = AssertUnwindSafe(body(&session)).catch_unwind().await;
        session.close().await;
        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Terminate the browser. Closing twice is a no-op.
    pub async fn close(&mut self) {
        match self.browser.take() {
            Some(browser) => {
                if shut_down(&browser, "at session end").await {
                    info!(url = %self.url, "browser session closed");
                }
            }
            None => warn!("browser session already closed"),
        }
    }

    pub fn is_open(&self) -> bool {
        self.browser.is_some()
    }

    /// The launched browser, until [`close`](Self::close) releases it
    pub fn browser(&self) -> Option<&Browser> {
        self.browser.as_ref()
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn listing(&self) -> &ListingPage {
        &self.listing
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn waits(&self) -> &WaitConfig {
        &self.waits
    }

    /// Retry bound for every element lookup
    pub fn implicit_wait(&self) -> Duration {
        self.config.implicit_wait()
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy::from(&self.waits)
    }

    pub async fn title(&self) -> HarnessResult<String> {
        Ok(self.page.title().await?)
    }
}

/// Close `browser`, logging instead of failing; true when it closed cleanly
async fn shut_down(browser: &Browser, when: &str) -> bool {
    match browser.close().await {
        Ok(()) => true,
        Err(e) => {
            warn!("browser did not close cleanly {when}: {e}");
            false
        }
    }
}
