//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool capacity > 0, addresses parse)
//! - Detect conflicting pool names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),

    #[error("pool #{0} has an empty name")]
    EmptyPoolName(usize),

    #[error("pool `{0}` is defined more than once")]
    DuplicatePool(String),

    #[error("pool `{0}` must have a capacity greater than 0")]
    ZeroCapacity(String),

    #[error("invalid telemetry endpoint `{0}`")]
    TelemetryEndpoint(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.server.bind_address.clone()));
    }

    let mut seen = HashSet::new();
    for (i, pool) in config.pools.iter().enumerate() {
        if pool.name.trim().is_empty() {
            errors.push(ValidationError::EmptyPoolName(i));
            continue;
        }
        if !seen.insert(pool.name.as_str()) {
            errors.push(ValidationError::DuplicatePool(pool.name.clone()));
        }
        if pool.capacity == 0 {
            errors.push(ValidationError::ZeroCapacity(pool.name.clone()));
        }
    }

    if let Some(endpoint) = &config.telemetry.endpoint {
        if url::Url::parse(endpoint).is_err() {
            errors.push(ValidationError::TelemetryEndpoint(endpoint.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
