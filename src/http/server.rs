//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create Axum Router with the read-only handlers
//! - Wire up middleware (tracing, timeout, request ID, request tracking)
//! - Accept connections and serve each on its own tracked task
//! - Stop with a graceful drain bounded by a deadline, then force-close
//!
//! # Shutdown
//! ```text
//! stop(deadline) → listener closed → every connection told to drain
//!     → all connection tasks done            → Ok
//!     → deadline passed → abort + join them  → ShutdownTimeout
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::handlers;
use crate::lifecycle::component::{ServerFactory, ServingComponent, ShutdownTimeout};
use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::net::{self, BindError, ConnectionTracker};
use crate::observability::metrics;

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Snapshot this instance was built from.
    pub config: Arc<AppConfig>,
    pub local_addr: SocketAddr,
}

/// A bound, serving instance.
struct RunningServer {
    local_addr: SocketAddr,
    /// Carries the drain deadline into the serve task.
    stop_tx: oneshot::Sender<Duration>,
    task: JoinHandle<Result<(), ShutdownTimeout>>,
}

/// One HTTP server instance built from a single configuration snapshot.
pub struct HttpServer {
    config: Arc<AppConfig>,
    running: Option<RunningServer>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState, tracker: ConnectionTracker) -> Router {
        let timeout = Duration::from_secs(state.config.http.request_timeout_secs);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/config", get(handlers::config))
            .with_state(state)
            .layer(middleware::from_fn_with_state(tracker, track_requests))
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}

impl ServingComponent for HttpServer {
    async fn start(&mut self) -> Result<(), BindError> {
        let (listener, local_addr) = net::bind(&self.config.system).await?;

        let tracker = ConnectionTracker::new();
        let state = AppState {
            config: Arc::clone(&self.config),
            local_addr,
        };
        let app = Self::build_router(state, tracker.clone());

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, app, tracker, stop_rx));

        tracing::info!(
            address = %local_addr,
            name = %self.config.system.name,
            "HTTP server starting"
        );

        self.running = Some(RunningServer {
            local_addr,
            stop_tx,
            task,
        });
        Ok(())
    }

    async fn stop(&mut self, deadline: Duration) -> Result<(), ShutdownTimeout> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let RunningServer {
            local_addr,
            stop_tx,
            task,
        } = running;

        // The serve task enforces the deadline itself and only returns once
        // every connection task is gone.
        let _ = stop_tx.send(deadline);

        match task.await {
            Ok(Ok(())) => {
                tracing::info!(address = %local_addr, "HTTP server stopped");
                Ok(())
            }
            Ok(Err(timeout)) => {
                tracing::warn!(
                    address = %local_addr,
                    connections = timeout.connections,
                    in_flight = timeout.in_flight,
                    deadline = ?deadline,
                    "HTTP server drain deadline exceeded, forced close"
                );
                Err(timeout)
            }
            Err(e) => {
                tracing::error!(address = %local_addr, error = %e, "HTTP server task failed");
                Ok(())
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }
}

/// Accept loop and drain for one instance.
///
/// A dropped `stop_rx` sender is treated as a stop with no grace period.
async fn serve(
    listener: TcpListener,
    app: Router,
    tracker: ConnectionTracker,
    mut stop_rx: oneshot::Receiver<Duration>,
) -> Result<(), ShutdownTimeout> {
    let builder = Builder::new(TokioExecutor::new());
    let draining = Shutdown::new();
    let mut connections = JoinSet::new();

    let deadline = loop {
        tokio::select! {
            biased;

            stop = &mut stop_rx => break stop.unwrap_or(Duration::ZERO),

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        builder.clone(),
                        app.clone(),
                        draining.subscribe(),
                        tracker.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },

            // Reap finished connections so the set does not grow unbounded.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    };

    // The port is free from here on, even while connections drain.
    drop(listener);
    draining.trigger();

    let drained = tokio::time::timeout(deadline, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_ok() {
        return Ok(());
    }

    let timeout = ShutdownTimeout {
        deadline,
        connections: tracker.active_connections(),
        in_flight: tracker.active_requests(),
    };
    connections.abort_all();
    while connections.join_next().await.is_some() {}
    Err(timeout)
}

/// Serve one connection until it ends or is aborted.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    builder: Builder<TokioExecutor>,
    app: Router,
    mut draining: ShutdownListener,
    tracker: ConnectionTracker,
) {
    let guard = tracker.track_connection();
    let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(app));
    tokio::pin!(conn);

    let mut drain_requested = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(
                        connection_id = %guard.id(),
                        peer = %peer,
                        error = %e,
                        "Connection ended with error"
                    );
                }
                break;
            }
            _ = draining.recv(), if !drain_requested => {
                conn.as_mut().graceful_shutdown();
                drain_requested = true;
            }
        }
    }
}

/// Builds an [`HttpServer`] for every snapshot the supervisor hands it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpServerFactory;

impl ServerFactory for HttpServerFactory {
    type Server = HttpServer;

    fn build(&self, config: Arc<AppConfig>) -> HttpServer {
        HttpServer::new(config)
    }
}

/// Count in-flight requests and record them once answered.
pub(crate) async fn track_requests(
    State(tracker): State<ConnectionTracker>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = tracker.track_request();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    metrics::record_request(&path, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    fn test_config() -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.system.name = "unit".into();
        config.system.host = "127.0.0.1".into();
        config.system.port = 0;
        Arc::new(config)
    }

    fn test_router() -> Router {
        let state = AppState {
            config: test_config(),
            local_addr: SocketAddr::from(([127, 0, 0, 1], 4321)),
        };
        HttpServer::build_router(state, ConnectionTracker::new())
    }

    fn get_request(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn collect_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn started_server() -> (HttpServer, SocketAddr) {
        let mut server = HttpServer::new(test_config());
        server.start().await.unwrap();
        let addr = server.local_addr().unwrap();
        (server, addr)
    }

    #[tokio::test]
    async fn health_reports_identity() {
        let response = test_router()
            .oneshot(get_request("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = collect_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["app_name"], "unit");
        assert_eq!(body["host"], "127.0.0.1");
        assert_eq!(body["address"], "127.0.0.1:4321");
    }

    #[tokio::test]
    async fn config_reports_snapshot() {
        let response = test_router()
            .oneshot(get_request("/config"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = collect_json(response).await;
        assert_eq!(body["config"]["system"]["name"], "unit");
        assert_eq!(body["config"]["lifecycle"]["debounce_ms"], 1000);
    }

    #[tokio::test]
    async fn requests_are_counted_while_in_handler() {
        let tracker = ConnectionTracker::new();
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "done"
                }),
            )
            .layer(middleware::from_fn_with_state(tracker.clone(), track_requests));

        let pending = tokio::spawn(app.oneshot(get_request("/slow")));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.active_requests(), 1);

        pending.abort();
        let _ = pending.await;
        assert_eq!(tracker.active_requests(), 0);
    }

    #[tokio::test]
    async fn start_binds_and_stop_releases_port() {
        let (mut server, addr) = started_server().await;

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let body: serde_json::Value = client
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["app_name"], "unit");

        server.stop(Duration::from_secs(5)).await.unwrap();
        assert!(server.local_addr().is_none());

        // The same port is immediately free again.
        let rebound = tokio::net::TcpListener::bind(addr).await;
        assert!(rebound.is_ok(), "port still held: {:?}", rebound.err());
    }

    #[tokio::test]
    async fn idle_keep_alive_connection_drains_gracefully() {
        let (mut server, addr) = started_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"HTTP/1.1 200"));

        let started = Instant::now();
        server.stop(Duration::from_secs(5)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn forced_close_drops_stalled_connection() {
        let (mut server, addr) = started_server().await;

        // A request head that never completes keeps the connection busy.
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: x\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let deadline = Duration::from_millis(200);
        let started = Instant::now();
        let timeout = server.stop(deadline).await.unwrap_err();

        assert_eq!(timeout.deadline, deadline);
        assert_eq!(timeout.connections, 1);
        assert!(started.elapsed() < deadline + Duration::from_millis(500));

        // The server side of the socket is gone: EOF or reset, not a hang.
        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
            .await
            .expect("connection still open after forced close");
        assert!(matches!(read, Ok(0) | Err(_)), "unexpected read: {read:?}");

        let rebound = tokio::net::TcpListener::bind(addr).await;
        assert!(rebound.is_ok(), "port still held: {:?}", rebound.err());
    }
}
