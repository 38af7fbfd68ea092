//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use relaunch::config::{AppConfig, ConfigSource, SharedConfig};
use relaunch::lifecycle::debounce::RestartSender;
use relaunch::lifecycle::{restart_slot, ServerFactory, ServingComponent, Shutdown, ShutdownTimeout, Supervisor, SupervisorOptions};
use relaunch::net::BindError;

/// Observes every mock server instance built by one factory.
#[derive(Default)]
pub struct MockStats {
    /// Instances currently bound.
    pub bound: AtomicI64,
    /// Highest value `bound` ever reached.
    pub max_bound: AtomicI64,
    pub starts: AtomicU64,
    pub stops: AtomicU64,
    pub fail_next_start: AtomicBool,
    /// How long a graceful drain takes.
    pub drain_ms: AtomicU64,
}

impl MockStats {
    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn bound(&self) -> i64 {
        self.bound.load(Ordering::SeqCst)
    }

    pub fn max_bound(&self) -> i64 {
        self.max_bound.load(Ordering::SeqCst)
    }
}

/// A serving component that only counts, with a configurable drain time.
pub struct MockServer {
    stats: Arc<MockStats>,
    bound: bool,
}

impl ServingComponent for MockServer {
    async fn start(&mut self) -> Result<(), BindError> {
        if self.stats.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(BindError {
                address: "127.0.0.1:1".into(),
                source: io::Error::from(io::ErrorKind::AddrInUse),
            });
        }
        // Yield so overlapping instances would actually interleave.
        tokio::task::yield_now().await;
        let now = self.stats.bound.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_bound.fetch_max(now, Ordering::SeqCst);
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        self.bound = true;
        Ok(())
    }

    async fn stop(&mut self, deadline: Duration) -> Result<(), ShutdownTimeout> {
        let drain = Duration::from_millis(self.stats.drain_ms.load(Ordering::SeqCst));
        let result = if drain > deadline {
            tokio::time::sleep(deadline).await;
            Err(ShutdownTimeout {
                deadline,
                connections: 1,
                in_flight: 1,
            })
        } else {
            tokio::time::sleep(drain).await;
            Ok(())
        };
        if self.bound {
            self.stats.bound.fetch_sub(1, Ordering::SeqCst);
            self.bound = false;
        }
        self.stats.stops.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.then(|| SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

pub struct MockFactory(pub Arc<MockStats>);

impl ServerFactory for MockFactory {
    type Server = MockServer;

    fn build(&self, _config: Arc<AppConfig>) -> MockServer {
        MockServer {
            stats: self.0.clone(),
            bound: false,
        }
    }
}

/// A supervisor over mock servers plus the handles a test drives it with.
pub struct Harness {
    pub supervisor: Arc<Supervisor<MockFactory>>,
    pub source: Arc<SharedConfig>,
    pub restart_tx: RestartSender,
    pub shutdown: Shutdown,
    pub stats: Arc<MockStats>,
}

pub fn harness(options: SupervisorOptions) -> Harness {
    let stats = Arc::new(MockStats::default());
    let source = Arc::new(SharedConfig::new(AppConfig::default()));
    let (restart_tx, restart_rx) = restart_slot();
    let shutdown = Shutdown::new();
    let dyn_source: Arc<dyn ConfigSource> = source.clone();

    let supervisor = Arc::new(Supervisor::new(
        MockFactory(stats.clone()),
        dyn_source,
        restart_rx,
        shutdown.clone(),
        options,
    ));

    Harness {
        supervisor,
        source,
        restart_tx,
        shutdown,
        stats,
    }
}

pub fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        stop_deadline: Duration::from_secs(1),
        rebind_delay: Duration::ZERO,
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Loopback config on a port that was free a moment ago.
pub async fn loopback_config(name: &str) -> AppConfig {
    let scratch = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = scratch.local_addr().unwrap().port();
    drop(scratch);

    let mut config = AppConfig::default();
    config.system.name = name.into();
    config.system.host = "127.0.0.1".into();
    config.system.port = port;
    config.lifecycle.rebind_delay_ms = 0;
    config.lifecycle.reload_delay_ms = 20;
    config.lifecycle.stop_deadline_secs = 2;
    config
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
