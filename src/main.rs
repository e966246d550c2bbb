use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use facetcheck::config::HarnessConfig;
use facetcheck::scenarios::{self, Scenario};
use facetcheck::server::{self, ContentServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Browser-driven checks for faceted listing pages.
#[derive(Parser)]
#[command(name = "facetcheck")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a site directory until Ctrl+C
    Serve {
        /// Site root directory
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind
        #[arg(long)]
        host: Option<String>,
    },
    /// Serve a site directory and run checks against it
    Run {
        /// Site root directory
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Which check to run: a, b, c, d, smoke or all
        #[arg(short, long, default_value = "all")]
        scenario: String,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },
}

/// Defaults, then the YAML file, then the environment; CLI flags are applied by the caller
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

async fn run(config: HarnessConfig, selected: Vec<Scenario>) -> anyhow::Result<()> {
    let server = ContentServer::start(&config.server).await?;
    let playwright = playwright_rs::Playwright::launch()
        .await
        .context("launching Playwright; run `npx playwright install` first")?;

    let mut failed = 0;
    for scenario in &selected {
        match scenarios::run(&playwright, server.base_url(), &config, *scenario).await {
            Ok(report) => println!("PASS {report}"),
            Err(e) => {
                failed += 1;
                error!(?scenario, "{e}");
                println!("FAIL {scenario:?}: {e}");
            }
        }
    }
    server.stop().await;

    info!(total = selected.len(), failed, "run finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} checks failed", selected.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("facetcheck=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { root, port, host } => {
            let mut config = load_config(None)?;
            if let Some(root) = root {
                config.server.root = root;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            server::serve(&config.server).await?;
        }
        Commands::Run {
            root,
            port,
            config,
            scenario,
            headed,
        } => {
            let selected = Scenario::parse(&scenario)
                .with_context(|| format!("unknown scenario '{scenario}'"))?;
            let mut config = load_config(config.as_ref())?;
            if let Some(root) = root {
                config.server.root = root;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if headed {
                config.session.headless = false;
            }
            run(config, selected).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["facetcheck"]).is_err());
    }

    #[test]
    fn cli_parses_serve_subcommand() {
        let cli = Cli::try_parse_from(["facetcheck", "serve", "--root", "site", "--port", "9000"])
            .unwrap();
        match cli.command {
            Commands::Serve { root, port, host } => {
                assert_eq!(root, Some(PathBuf::from("site")));
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn cli_parses_run_with_defaults() {
        let cli = Cli::try_parse_from(["facetcheck", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                scenario,
                headed,
                config,
                ..
            } => {
                assert_eq!(scenario, "all");
                assert!(!headed);
                assert!(config.is_none());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn cli_parses_run_scenario_and_config() {
        let cli = Cli::try_parse_from([
            "facetcheck",
            "run",
            "--scenario",
            "d",
            "--config",
            "facetcheck.yaml",
            "--headed",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                scenario,
                config,
                headed,
                ..
            } => {
                assert_eq!(Scenario::parse(&scenario), Some(vec![Scenario::D]));
                assert_eq!(config, Some(PathBuf::from("facetcheck.yaml")));
                assert!(headed);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn load_config_without_file_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.waits, HarnessConfig::default().waits);
    }
}
