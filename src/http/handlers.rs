//! Read-only endpoints reporting liveness and the active configuration.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::AppConfig;
use crate::http::server::AppState;

/// Timestamp layout used by `/health`.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub app_name: String,
    pub host: String,
    pub port: u16,
    /// Actual bound address; differs from `port` when port 0 was configured.
    pub address: String,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub config: AppConfig,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let system = &state.config.system;
    Json(HealthStatus {
        status: "ok",
        app_name: system.name.clone(),
        host: system.host.clone(),
        port: system.port,
        address: state.local_addr.to_string(),
        time: chrono::Local::now().format(TIME_FORMAT).to_string(),
    })
}

pub async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        config: AppConfig::clone(&state.config),
    })
}
