//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override {name}: {reason}")]
    Env { name: &'static str, reason: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate configuration.
///
/// Without a path the built-in defaults are used as the base.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply `GATEWAY_*` overrides on top of a loaded configuration.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("GATEWAY_PORT") {
        let port: u16 = port.parse().map_err(|_| ConfigError::Env {
            name: "GATEWAY_PORT",
            reason: format!("`{}` is not a port", port),
        })?;
        let host = config
            .server
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.server.bind_address = format!("{}:{}", host, port);
    }

    if let Some(limit) = lookup("GATEWAY_STORAGE_LIMIT") {
        config.server.storage_limit = limit.parse().map_err(|_| ConfigError::Env {
            name: "GATEWAY_STORAGE_LIMIT",
            reason: format!("`{}` is not a byte count", limit),
        })?;
    }

    if let Some(version) = lookup("GATEWAY_VERSION") {
        config.server.version = version;
    }

    if let Some(mode) = lookup("GATEWAY_MODE") {
        config.server.mode = mode
            .parse()
            .map_err(|reason| ConfigError::Env { name: "GATEWAY_MODE", reason })?;
    }

    Ok(())
}
