// Logger configuration
use serde::{Deserialize, Serialize};

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines for development
    Pretty,
    /// One JSON object per event for production
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Default directive used when `RUST_LOG` is not set
    pub log_level: String,
    pub format: LogFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggerConfig {
    /// Pick the format from `HCX_ENV`, JSON unless running in development
    pub fn from_env(verbose: bool) -> Self {
        let is_development = std::env::var("HCX_ENV")
            .map(|env| env == "development")
            .unwrap_or(true);
        Self {
            log_level: if verbose { "debug" } else { "info" }.to_string(),
            format: if is_development { LogFormat::Pretty } else { LogFormat::Json },
        }
    }
}
