use std::sync::Arc;

use crate::{
    config::ServerConfig,
    downstream::{DownstreamGroup, HttpDownstream},
    error::ApiError,
    handlers::websocket::NotificationHub,
};

/// Shared state of the portal server
#[derive(Clone)]
pub struct PortalServer {
    pub config: Arc<ServerConfig>,
    /// Group behind `/v1/coverageeligibility`
    pub coverage_eligibility: Arc<dyn DownstreamGroup>,
    /// Group behind `/v1/claim`
    pub claim: Arc<dyn DownstreamGroup>,
    pub hub: NotificationHub,
}

impl PortalServer {
    /// Build the server with HTTP upstreams taken from the configuration
    pub fn new(config: ServerConfig) -> Result<Self, ApiError> {
        let timeout = config.request_timeout();
        let coverage_eligibility =
            HttpDownstream::new("coverageeligibility", config.coverage_eligibility_url.clone(), timeout)?;
        let claim = HttpDownstream::new("claim", config.claim_url.clone(), timeout)?;

        Ok(Self::with_downstreams(
            config,
            Arc::new(coverage_eligibility),
            Arc::new(claim),
        ))
    }

    pub fn with_downstreams(
        config: ServerConfig,
        coverage_eligibility: Arc<dyn DownstreamGroup>,
        claim: Arc<dyn DownstreamGroup>,
    ) -> Self {
        let hub = NotificationHub::new(config.broadcast_capacity);
        Self {
            config: Arc::new(config),
            coverage_eligibility,
            claim,
            hub,
        }
    }
}
