use thiserror::Error;

use crate::lifecycle::LifecycleState;

#[derive(Error, Debug)]
pub enum InsuranceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A request is already in flight (state: {state})")]
    RequestInFlight { state: LifecycleState },

    #[error("Retry is only accepted once a request has finished (state: {state})")]
    NotFinished { state: LifecycleState },

    #[error("Unknown scenario: {0}")]
    UnknownScenario(u32),

    #[error("Notification channel error: {0}")]
    Channel(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type InsuranceResult<T> = Result<T, InsuranceError>;
