//! HCX portal server
//!
//! Forwards `/v1/coverageeligibility/*` and `/v1/claim/*` to their downstream
//! groups unchanged, and pushes result callbacks to WebSocket clients on
//! `/ws` as `acknowledgement` frames.

pub mod config;
pub mod downstream;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use config::ServerConfig;
pub use downstream::{DownstreamGroup, ForwardRequest, ForwardResponse, HttpDownstream};
pub use error::*;
pub use handlers::websocket::NotificationHub;
pub use server::PortalServer;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use insurance_service::CORRELATION_HEADER;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the application router with all routes and middleware
pub fn create_app(server: PortalServer) -> Router {
    let cors = create_cors_layer(&server.config.cors_origins);
    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(server)
}

fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if allowed.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(CORRELATION_HEADER),
        ])
}
