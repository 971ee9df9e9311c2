use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::PortalServer;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
    pub version: String,
    /// Connected notification clients
    pub connected_clients: usize,
}

pub async fn health_check(State(server): State<PortalServer>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: server.config.name.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connected_clients: server.hub.connected_clients(),
    })
}
