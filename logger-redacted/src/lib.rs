//! Tracing setup with PHI redaction
//!
//! Insurance payloads carry policy identifiers, patient names and FHIR
//! bundles. Nothing from them reaches a log line unredacted: values under
//! sensitive keys are replaced with a short SHA-256 token (so the same policy
//! can still be followed across log lines) and free text is scanned for
//! e-mail addresses, phone numbers and SSNs.
//!
//! ```
//! use serde_json::json;
//!
//! let redacted = logger_redacted::redact_json(&json!({ "policyId": "PL-1", "gender": "Male" }));
//! assert_ne!(redacted["policyId"], "PL-1");
//! assert_eq!(redacted["gender"], "Male");
//! ```

pub mod config;
pub mod macros;
pub mod redactor;

pub use config::*;
pub use redactor::*;

#[doc(hidden)]
pub use tracing;

use lazy_static::lazy_static;
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

lazy_static! {
    static ref DEFAULT_REDACTOR: PiiRedactor = PiiRedactor::default();
}

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Redact a JSON payload with the default rules
pub fn redact_json(value: &Value) -> Value {
    DEFAULT_REDACTOR.redact_json(value)
}

/// Redact free text with the default rules
pub fn redact_text(text: &str) -> String {
    DEFAULT_REDACTOR.redact(text)
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `directives` is used, with
/// `{level}` replaced by the configured level.
pub fn init_tracing(config: &LoggerConfig, directives: &str) -> Result<(), LoggerError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directives.replace("{level}", &config.log_level))
            .map_err(|e| LoggerError::Filter(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
    };

    installed.map_err(|e| LoggerError::AlreadyInstalled(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_redactor_hides_submit_payload() {
        let payload = json!({
            "policyId": "PL-9",
            "name": "Ravi Kumar",
            "gender": "Male",
        });
        let text = redact_json(&payload).to_string();
        assert!(!text.contains("PL-9"));
        assert!(!text.contains("Ravi"));
        assert!(text.contains("Male"));
    }

    #[test]
    fn verbose_flag_selects_debug_level() {
        assert_eq!(LoggerConfig::from_env(true).log_level, "debug");
        assert_eq!(LoggerConfig::from_env(false).log_level, "info");
    }
}
