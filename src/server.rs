//! Static content server for the system under test.
//!
//! The listener runs on its own thread with its own multi-threaded runtime, so it keeps
//! serving across the short-lived runtimes of individual tests and handles connections
//! from several browser sessions at once.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::sync::{OnceCell, oneshot};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{HarnessError, HarnessResult};

static SHARED: OnceCell<ContentServer> = OnceCell::const_new();

/// How long `stop` waits for the serving thread to wind down before detaching it
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Whether this handle owns the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// The listener was bound by this process
    Owned,
    /// The port was already bound; requests go to whoever holds it
    Reused,
}

/// Handle to a running (or reused) static file server
#[derive(Debug)]
pub struct ContentServer {
    base_url: String,
    mode: ServeMode,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Router serving `root` with plain file semantics: 200 for files, 404 otherwise
pub fn router(root: PathBuf) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(TraceLayer::new_for_http())
}

impl ContentServer {
    /// Bind the listener and return once it answers requests.
    ///
    /// A port that is already bound is treated as a stale server from an earlier run and
    /// reused rather than reported as an error.
    pub async fn start(config: &ServerConfig) -> HarnessResult<Self> {
        let root = config.root.clone();
        if !root.is_dir() {
            return Err(HarnessError::Config(format!(
                "document root {} is not a directory",
                root.display()
            )));
        }

        let (ready_tx, ready_rx) = oneshot::channel::<std::io::Result<SocketAddr>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let host = config.host.clone();
        let port = config.port;

        let thread = std::thread::Builder::new()
            .name("facetcheck-server".to_string())
            .spawn(move || serve_on_thread(host, port, root, ready_tx, shutdown_rx))?;

        let bound = ready_rx
            .await
            .map_err(|_| HarnessError::Config("server thread exited before binding".into()))?;

        let server = match bound {
            Ok(addr) => {
                info!(%addr, root = %config.root.display(), "content server listening");
                Self {
                    base_url: format!("http://{}:{}", config.host, addr.port()),
                    mode: ServeMode::Owned,
                    shutdown: Mutex::new(Some(shutdown_tx)),
                    thread: Mutex::new(Some(thread)),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                join_thread(thread).await;
                let in_use = HarnessError::ResourceInUse {
                    host: config.host.clone(),
                    port,
                };
                warn!("{in_use}; reusing the existing server");
                Self {
                    base_url: config.base_url(),
                    mode: ServeMode::Reused,
                    shutdown: Mutex::new(None),
                    thread: Mutex::new(None),
                }
            }
            Err(e) => {
                join_thread(thread).await;
                return Err(e.into());
            }
        };

        let settle = Duration::from_millis(config.settle_timeout_ms);
        match (server.wait_until_serving(settle).await, server.mode) {
            (Ok(()), _) => Ok(server),
            (Err(e), ServeMode::Reused) => {
                warn!("reused server did not answer: {e}");
                Ok(server)
            }
            (Err(e), ServeMode::Owned) => {
                server.stop().await;
                Err(e)
            }
        }
    }

    /// Process-wide instance, started on first use
    pub async fn shared(config: &ServerConfig) -> HarnessResult<&'static ContentServer> {
        SHARED.get_or_try_init(|| Self::start(config)).await
    }

    /// Poll the root URL until any HTTP response comes back
    async fn wait_until_serving(&self, budget: Duration) -> HarnessResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()?;
        let url = format!("{}/", self.base_url);
        let start = Instant::now();

        loop {
            match client.get(&url).send().await {
                Ok(resp) => {
                    debug!(status = %resp.status(), "content server answered");
                    return Ok(());
                }
                Err(e) if start.elapsed() >= budget => {
                    debug!("last readiness error: {e}");
                    return Err(HarnessError::timeout(
                        format!("content server at {url}"),
                        start.elapsed(),
                    ));
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mode(&self) -> ServeMode {
        self.mode
    }

    /// URL of a page relative to the document root
    pub fn page_url(&self, page: &str) -> String {
        format!("{}/{}", self.base_url, page.trim_start_matches('/'))
    }

    /// Ask the serving thread to shut down; returns its handle if this call sent the signal
    fn signal_shutdown(&self) -> Option<JoinHandle<()>> {
        let sender = self.shutdown.lock().ok().and_then(|mut s| s.take())?;
        if sender.send(()).is_err() {
            warn!("content server thread was already gone");
        }
        self.thread.lock().ok().and_then(|mut t| t.take())
    }

    /// Close the listener and release the port. Safe to call repeatedly.
    ///
    /// The serving thread is joined off the async workers, for at most [`STOP_GRACE`].
    pub async fn stop(&self) {
        let Some(handle) = self.signal_shutdown() else {
            debug!("content server already stopped or not owned");
            return;
        };
        match tokio::time::timeout(STOP_GRACE, join_thread(handle)).await {
            Ok(()) => info!(base_url = %self.base_url, "content server stopped"),
            Err(_) => warn!("content server still draining connections; detaching"),
        }
    }
}

impl Drop for ContentServer {
    fn drop(&mut self) {
        if self.signal_shutdown().is_some() {
            debug!(base_url = %self.base_url, "content server dropped; shutdown signalled");
        }
    }
}

async fn join_thread(handle: JoinHandle<()>) {
    match tokio::task::spawn_blocking(move || handle.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => warn!("content server thread panicked"),
        Err(e) => warn!("could not join content server thread: {e}"),
    }
}

fn serve_on_thread(
    host: String,
    port: u16,
    root: PathBuf,
    ready: oneshot::Sender<std::io::Result<SocketAddr>>,
    shutdown: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("facetcheck-http")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::bind((host.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(addr));

        let result = axum::serve(listener, router(root))
            .with_graceful_shutdown(async {
                let _ = shutdown.await;
            })
            .await;
        if let Err(e) = result {
            warn!("content server error: {e}");
        }
    });
}

/// Serve `config.root` until Ctrl+C
pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let server = ContentServer::start(config).await?;

    println!("Serving {} at {}", config.root.display(), server.base_url());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_root_is_rejected() {
        let config = ServerConfig {
            root: PathBuf::from("/definitely/not/a/site/root"),
            port: 0,
            ..ServerConfig::default()
        };
        let err = ContentServer::start(&config).await.unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[tokio::test]
    async fn page_url_joins_without_double_slash() {
        let dir = std::env::temp_dir();
        let config = ServerConfig {
            root: dir,
            port: 0,
            ..ServerConfig::default()
        };
        let server = ContentServer::start(&config).await.unwrap();
        assert_eq!(server.mode(), ServeMode::Owned);
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        assert_eq!(
            server.page_url("/food-places.html"),
            format!("{}/food-places.html", server.base_url())
        );
        server.stop().await;
        server.stop().await;
    }

    #[tokio::test]
    async fn stop_yields_while_a_connection_drains() {
        use std::io::Write;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let config = ServerConfig {
            root: std::env::temp_dir(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = ContentServer::start(&config).await.unwrap();
        let addr = server.base_url().trim_start_matches("http://").to_string();

        // A request that never finishes its headers keeps graceful shutdown waiting
        let mut stalled = std::net::TcpStream::connect(&addr).unwrap();
        stalled.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        let start = Instant::now();
        server.stop().await;
        let elapsed = start.elapsed();
        ticker.abort();

        assert!(elapsed <= STOP_GRACE + Duration::from_millis(500), "{elapsed:?}");
        let expected = elapsed.as_millis() / 50;
        let seen = ticks.load(Ordering::SeqCst) as u128;
        assert!(seen >= expected, "{seen} ticks in {elapsed:?}");
        drop(stalled);
    }
}
