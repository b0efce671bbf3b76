//! Telemetry server
//!
//! Background HTTP listener exposing the stats store (`GET /stats`) and
//! accepting log callbacks from pods (`POST /logs`). It runs on its own
//! task; the cycle loop only talks to it through the `update_*` methods,
//! which write straight into the shared [`Stats`] store.

pub mod api;
pub mod stats;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use self::api::AppState;
pub use self::stats::Stats;

/// Environment variable consulted when no API key is passed explicitly
pub const API_KEY_ENV: &str = "TRANSCRIPTION_API_KEY";

/// How long `shutdown` waits for the serving task
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to bind telemetry server to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("telemetry server is already running")]
    AlreadyStarted,
}

/// Background HTTP server publishing the manager's stats
pub struct TelemetryServer {
    host: String,
    port: u16,
    api_key: Option<Arc<str>>,
    stats: Arc<Stats>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryServer {
    /// Creates a server that is not listening yet
    ///
    /// # Arguments
    /// * `host` - Interface to bind
    /// * `port` - Port to bind, 0 for an ephemeral port
    /// * `api_key` - Required key; falls back to `TRANSCRIPTION_API_KEY`
    /// * `stats` - Store shared with the cycle loop
    pub fn new(
        host: impl Into<String>,
        port: u16,
        api_key: Option<String>,
        stats: Arc<Stats>,
    ) -> Self {
        let api_key = resolve_api_key(api_key, std::env::var(API_KEY_ENV).ok());

        Self {
            host: host.into(),
            port,
            api_key: api_key.map(Arc::from),
            stats,
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Router serving this server's endpoints
    pub fn router(&self) -> axum::Router {
        api::create_router(AppState {
            stats: Arc::clone(&self.stats),
            api_key: self.api_key.clone(),
        })
    }

    /// Binds the listener and starts serving on a background task
    ///
    /// Returns the bound address once the listener is ready; the caller is
    /// not blocked while requests are served.
    pub async fn start(&self) -> Result<SocketAddr, TelemetryError> {
        if self.is_running() {
            return Err(TelemetryError::AlreadyStarted);
        }

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TelemetryError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TelemetryError::Bind { addr, source })?;

        let app = self.router();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;

            if let Err(e) = result {
                error!("Telemetry server error: {}", e);
            }
        });

        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!(
            "Telemetry server listening on http://{} (api key {})",
            local_addr,
            if self.api_key.is_some() { "required" } else { "not required" }
        );

        Ok(local_addr)
    }

    /// Whether the serving task is still alive
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signals the server to stop and waits briefly for it
    ///
    /// After the grace period the serving task is aborted and shutdown
    /// proceeds regardless. Calling this on a server that never started is
    /// a no-op apart from setting the stop signal.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(mut handle) = handle else {
            debug!("Telemetry server was not running");
            return;
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
            Ok(_) => info!("Telemetry server stopped"),
            Err(_) => {
                warn!(
                    "Telemetry server did not stop within {:?}, aborting",
                    SHUTDOWN_GRACE
                );
                handle.abort();
            }
        }
    }

    pub fn update_pods_total(&self, value: u64) {
        debug!("Updating pods_total to {}", value);
        self.stats.set_pods_total(value);
    }

    pub fn update_pods_running(&self, value: u64) {
        debug!("Updating pods_running to {}", value);
        self.stats.set_pods_running(value);
    }

    pub fn update_pipeline_last_run_time(&self, value: i64) {
        debug!("Updating pipeline_last_run_time to {}", value);
        self.stats.set_pipeline_last_run_time(value);
    }
}

/// Explicit key wins; empty values count as absent
fn resolve_api_key(explicit: Option<String>, from_env: Option<String>) -> Option<String> {
    explicit
        .filter(|key| !key.is_empty())
        .or_else(|| from_env.filter(|key| !key.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcycle_client::{ClientError, TelemetryClient};

    fn server(api_key: Option<&str>) -> TelemetryServer {
        TelemetryServer::new(
            "127.0.0.1",
            0,
            api_key.map(str::to_string),
            Arc::new(Stats::new()),
        )
    }

    #[test]
    fn test_resolve_api_key() {
        assert_eq!(
            resolve_api_key(Some("override".into()), Some("env".into())).as_deref(),
            Some("override")
        );
        assert_eq!(
            resolve_api_key(None, Some("env".into())).as_deref(),
            Some("env")
        );
        assert_eq!(
            resolve_api_key(Some(String::new()), Some("env".into())).as_deref(),
            Some("env")
        );
        assert_eq!(resolve_api_key(None, Some(String::new())), None);
        assert_eq!(resolve_api_key(None, None), None);
    }

    #[test]
    fn test_update_methods_write_through() {
        let server = server(Some("secret"));
        server.update_pods_total(10);
        server.update_pods_running(7);
        server.update_pipeline_last_run_time(1234567891);

        assert_eq!(server.stats().get_pods_total(), 10);
        assert_eq!(server.stats().get_pods_running(), 7);
        assert_eq!(server.stats().get_pipeline_last_run_time(), 1234567891);
    }

    #[tokio::test]
    async fn test_start_serve_and_shutdown() {
        let server = server(Some("secret"));
        let addr = server.start().await.unwrap();
        assert!(server.is_running());

        server.update_pods_total(4);
        server.update_pods_running(2);

        let url = format!("http://{}", addr);
        let stats = TelemetryClient::new(&url, Some("secret".to_string()))
            .stats()
            .await
            .unwrap();
        assert_eq!(stats.pods_total, 4);
        assert_eq!(stats.pods_running, 2);

        let err = TelemetryClient::new(&url, Some("wrong".to_string()))
            .stats()
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ApiError { status: 403, .. }));

        server.shutdown().await;
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let server = server(None);
        server.start().await.unwrap();
        assert!(matches!(
            server.start().await,
            Err(TelemetryError::AlreadyStarted)
        ));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_without_start() {
        let server = server(None);
        server.shutdown().await;
        assert!(!server.is_running());
    }
}
