use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Portal server configuration
///
/// Sources, later ones winning: built-in defaults, an optional config file
/// (YAML or TOML), then `HCX_`-prefixed environment variables such as
/// `HCX_PORT` or `HCX_CLAIM_URL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported by `/health`
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Upstream base URL for the coverage eligibility group
    pub coverage_eligibility_url: String,
    /// Upstream base URL for the claim group
    pub claim_url: String,
    /// Downstream request timeout in seconds
    pub request_timeout: u64,
    /// Notification frames buffered per WebSocket client
    pub broadcast_capacity: usize,
    /// Origins allowed by CORS; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "HCX Portal".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            coverage_eligibility_url: "http://localhost:8081/v1/coverageeligibility".to_string(),
            claim_url: "http://localhost:8082/v1/claim".to_string(),
            request_timeout: 30,
            broadcast_capacity: 256,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();
        let mut builder = Config::builder()
            .set_default("name", defaults.name)?
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("coverage_eligibility_url", defaults.coverage_eligibility_url)?
            .set_default("claim_url", defaults.claim_url)?
            .set_default("request_timeout", defaults.request_timeout)?
            .set_default("broadcast_capacity", defaults.broadcast_capacity as u64)?
            .set_default("cors_origins", defaults.cors_origins)?;

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("HCX")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
