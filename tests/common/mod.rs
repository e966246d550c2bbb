//! Shared setup for the browser tests.
//!
//! Browser tests need the Playwright driver and an installed browser
//! (`npx playwright install`). When either is missing the tests print why and return
//! early instead of failing.

#![allow(dead_code)]

use std::path::PathBuf;

use facetcheck::config::HarnessConfig;
use facetcheck::server::ContentServer;
use playwright_rs::Playwright;
use tracing_subscriber::EnvFilter;

/// The static site the tests drive
pub fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/site")
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("facetcheck=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Fixture root on an ephemeral port, with shorter pauses than a live site needs
pub fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.server.root = fixture_root();
    config.server.port = 0;
    config.session.implicit_wait_ms = 5_000;
    config.waits.location_pause_ms = 200;
    // Fixture pages re-render 150 ms after a toggle
    config.waits.settle_fallback_ms = 500;
    config
        .apply_env(|key| match key {
            "BROWSER" | "FACETCHECK_HEADLESS" => std::env::var(key).ok(),
            _ => None,
        })
        .expect("invalid BROWSER or FACETCHECK_HEADLESS");
    config
}

/// Process-wide fixture server shared by every test in this binary
pub async fn fixture_server(config: &HarnessConfig) -> &'static ContentServer {
    ContentServer::shared(&config.server)
        .await
        .expect("Failed to start fixture server")
}

/// Launch Playwright and make sure the configured browser starts, or explain the skip
pub async fn playwright_or_skip(test: &str, config: &HarnessConfig) -> Option<Playwright> {
    let playwright = match Playwright::launch().await {
        Ok(playwright) => playwright,
        Err(e) => {
            eprintln!("skipping {test}: Playwright unavailable ({e})");
            return None;
        }
    };

    let browser_type = match config.session.browser {
        facetcheck::config::BrowserKind::Chromium => playwright.chromium(),
        facetcheck::config::BrowserKind::Firefox => playwright.firefox(),
        facetcheck::config::BrowserKind::Webkit => playwright.webkit(),
    };
    match browser_type.launch().await {
        Ok(browser) => {
            let _ = browser.close().await;
            Some(playwright)
        }
        Err(e) => {
            eprintln!(
                "skipping {test}: {} could not be launched ({e})",
                config.session.browser.name()
            );
            None
        }
    }
}

/// Everything a browser test needs, or `None` when it should be skipped
pub async fn setup(test: &str) -> Option<(Playwright, HarnessConfig, String)> {
    init_tracing();
    let config = test_config();
    let playwright = playwright_or_skip(test, &config).await?;
    let base_url = fixture_server(&config).await.base_url().to_string();
    Some((playwright, config, base_url))
}
