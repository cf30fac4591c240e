//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    pub version: &'static str,
    /// Configured storage backend.
    pub backend: String,
}

/// GET /health - Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION"),
        backend: state.config().store_backend.to_string(),
    })
}

/// Build health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mangashelf_store::MemoryStore;

    use super::*;
    use crate::config::{ServerConfig, StoreBackend};

    #[tokio::test]
    async fn test_health_check() {
        let config = ServerConfig {
            store_backend: StoreBackend::Memory,
            ..ServerConfig::default()
        };
        let state = AppState::new(Arc::new(MemoryStore::new()), config);
        let response = health_check(State(state)).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.backend, "memory");
    }
}
