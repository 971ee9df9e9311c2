//! Insurance request lifecycle for Healthcare Claims Exchange (HCX) portals
//!
//! Tracks a single eligibility check or claim from submission to its final
//! result:
//! - Request payloads and bundled test scenarios
//! - The request lifecycle state machine (`initial → loading → acknowledged →
//!   resolved | rejected`)
//! - A session driver that performs the HTTP submission, listens for the
//!   pushed result and enforces the acknowledgement timeout
//! - Notification channels (WebSocket and in-process)
//! - Result summaries for display
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use insurance_service::{
//!     ClientConfig, Gender, HcxApiClient, LifecycleSession, RequestPayload, RequestType,
//!     SessionConfig, WebSocketChannel,
//! };
//!
//! # async fn run() -> Result<(), insurance_service::InsuranceError> {
//! let client = HcxApiClient::new(ClientConfig::default())?;
//! let channel = WebSocketChannel::connect("ws://localhost:8080/ws").await?;
//! let session = LifecycleSession::spawn(Arc::new(client), channel, SessionConfig::default());
//!
//! session
//!     .submit(RequestType::Eligibility, RequestPayload::new("PL-1001", "Asha Menon", Gender::Female))
//!     .await?;
//! let settled = session.wait_until_settled().await?;
//! println!("{}: {}", settled.state, settled.context.message);
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod lifecycle;
pub mod messages;
pub mod models;
pub mod notification;
pub mod scenarios;
pub mod session;
pub mod submission;
pub mod summary;

pub use error::*;
pub use lifecycle::*;
pub use models::*;
pub use notification::*;
pub use scenarios::*;
pub use session::*;
pub use submission::*;
pub use summary::*;
