//! Configuration management for the streaming TTS server
//!
//! Supports loading configuration from:
//! - YAML/TOML files
//! - Environment variables (`PACKET_TTS__SECTION__KEY`)

pub mod settings;
pub mod streaming;

pub use settings::{
    load_settings, LatencyConfig, ObservabilityConfig, ServerConfig, Settings,
};
pub use streaming::StreamingConfig;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::MissingField(key),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_crate_errors_map() {
        let err = ConfigError::from(config::ConfigError::NotFound("server.port".into()));
        assert!(matches!(err, ConfigError::MissingField(ref key) if key == "server.port"));

        let err = ConfigError::from(config::ConfigError::Message("bad toml".into()));
        assert!(matches!(err, ConfigError::ParseError(ref msg) if msg.contains("bad toml")));
    }
}
