pub mod paths;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{callbacks, forwarding, health, websocket},
    server::PortalServer,
};

/// Coverage eligibility routes: result callback plus verbatim forwarding
pub fn coverage_eligibility_routes() -> Router<PortalServer> {
    Router::new()
        .route(paths::coverage_eligibility::ON_CHECK, post(callbacks::on_check))
        .route(paths::FORWARD, post(forwarding::forward_coverage_eligibility))
}

/// Claim routes: result callback plus verbatim forwarding
pub fn claim_routes() -> Router<PortalServer> {
    Router::new()
        .route(paths::claim::ON_SUBMIT, post(callbacks::on_submit))
        .route(paths::FORWARD, post(forwarding::forward_claim))
}

pub fn create_routes() -> Router<PortalServer> {
    Router::new()
        .route(paths::HEALTH, get(health::health_check))
        .route(paths::WEBSOCKET, get(websocket::websocket_handler))
        .nest(paths::coverage_eligibility::PREFIX, coverage_eligibility_routes())
        .nest(paths::claim::PREFIX, claim_routes())
}
