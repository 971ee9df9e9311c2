//! Route path constants

/// Coverage eligibility group
pub mod coverage_eligibility {
    pub const PREFIX: &str = "/v1/coverageeligibility";
    pub const ON_CHECK: &str = "/on_check";
}

/// Claim group
pub mod claim {
    pub const PREFIX: &str = "/v1/claim";
    pub const ON_SUBMIT: &str = "/on_submit";
}

/// Catch-all below a group prefix, forwarded verbatim
pub const FORWARD: &str = "/*rest";

pub const HEALTH: &str = "/health";
pub const WEBSOCKET: &str = "/ws";
