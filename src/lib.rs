//! facetcheck - browser-driven verification of faceted listing pages.
//!
//! The crate serves a static site, drives a real browser against its listing pages, and
//! checks that the visible card set responds to filter controls the way a faceted listing
//! must: filters narrow, facets combine as AND, and clearing restores the baseline.
//!
//! ```no_run
//! use facetcheck::config::HarnessConfig;
//! use facetcheck::scenarios::{self, Scenario};
//! use facetcheck::server::ContentServer;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = HarnessConfig::from_env()?;
//! let server = ContentServer::start(&config.server).await?;
//! let playwright = playwright_rs::Playwright::launch().await?;
//! let report = scenarios::run(&playwright, server.base_url(), &config, Scenario::A).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod filters;
pub mod geolocation;
pub mod invariants;
pub mod locator;
pub mod nearby;
pub mod scenarios;
pub mod server;
pub mod session;
pub mod wait;

pub use error::{HarnessError, HarnessResult};
