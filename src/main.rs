//! relaunch
//!
//! Keeps one HTTP server alive, restarts it whenever its configuration file
//! changes, and shuts it down cleanly on SIGINT/SIGTERM.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──notify──▶ ConfigWatcher ──replace──▶ SharedConfig
//!                                                          │ on_change
//!                                                          ▼
//!                                                      Debouncer
//!                                                          │ RestartRequest (≤ 1 pending)
//!                                                          ▼
//!   SIGINT/SIGTERM ──▶ SignalListener ──Shutdown──▶   Supervisor ──stop/start──▶ HttpServer
//!                                                                                /health
//!                                                                                /config
//! ```
//!
//! Exit codes: 0 after a clean shutdown, 1 when initialization fails or the
//! supervisor shut itself down after a failed start.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use relaunch::config::{load_config, resolve_config_path};
use relaunch::lifecycle::startup::launch;
use relaunch::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "relaunch")]
#[command(about = "Keep an HTTP server running across configuration changes", long_about = None)]
struct Cli {
    /// Configuration file (default: ./config.toml, then ./config/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `log.level` from the configuration file
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging is configured from the file, so failures before it exists go to stderr.
    let path = match resolve_config_path(cli.config.as_deref(), Path::new(".")) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("relaunch: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("relaunch: failed to load {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    if let Some(level) = cli.log_level {
        config.log.level = level;
    }

    let _log_guard = match init_logging(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("relaunch: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        name = %config.system.name,
        address = %config.system.bind_address(),
        "relaunch starting"
    );

    let app = match launch(config, Some(&path)).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    match app.run().await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Exiting after fatal error");
            ExitCode::FAILURE
        }
    }
}
