//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, StreamingConfig};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Streaming pipeline configuration
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Latency recorder configuration
    #[serde(default)]
    pub latency: LatencyConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.streaming.validate()?;

        if self.latency.max_history == 0 {
            return Err(ConfigError::InvalidValue {
                field: "latency.max_history".to_string(),
                message: "History must hold at least one request".to_string(),
            });
        }

        if self.server.cors_origins.is_empty() {
            tracing::warn!("No CORS origins configured, allowing any origin");
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8050
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Rolling latency statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Requests kept for rolling averages
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_history() -> usize {
    100
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (PACKET_TTS prefix, `__` separator)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(
            File::with_name(&format!("config/{}", env_name)).required(false),
        );
    }

    builder = builder.add_source(
        Environment::with_prefix("PACKET_TTS")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
