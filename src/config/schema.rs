//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Lower bound for the request payload limit, in bytes.
pub const MIN_PAYLOAD_BYTES: u64 = 4_000_000;

/// Two years, in seconds.
pub const DEFAULT_ASSET_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 365 * 2;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener and process settings.
    pub server: ServerConfig,

    /// Static asset table settings.
    pub assets: AssetsConfig,

    /// Pooled backing-store connections, checked out once per dynamic request.
    pub pools: Vec<PoolConfig>,

    /// Per-request authorization baseline.
    pub auth: AuthConfig,

    /// Diagnostic delivery settings.
    pub telemetry: TelemetryConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Effective maximum payload: the storage limit, never below the fixed floor.
    pub fn max_payload_bytes(&self) -> u64 {
        self.server.storage_limit.max(MIN_PAYLOAD_BYTES)
    }

    /// Whether error responses may carry internal details.
    pub fn is_development(&self) -> bool {
        self.server.mode == RuntimeMode::Development
    }
}

/// Development or production behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Development,
    #[default]
    Production,
}

impl std::str::FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(RuntimeMode::Development),
            "production" | "prod" => Ok(RuntimeMode::Production),
            other => Err(format!("unknown mode `{}`", other)),
        }
    }
}

/// Listener and process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Development mode exposes failure details in error bodies.
    pub mode: RuntimeMode,

    /// Server version reported in error bodies and diagnostics.
    pub version: String,

    /// Storage limit in bytes; raises the payload limit above the floor.
    pub storage_limit: u64,

    /// Enable gzip response compression.
    pub compression: bool,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Runtime worker threads (defaults to the number of cores).
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            mode: RuntimeMode::default(),
            version: "UNKNOWN".to_string(),
            storage_limit: 10_000_000,
            compression: true,
            request_timeout_secs: 30,
            workers: None,
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Build-output directory scanned once at startup.
    pub directory: String,

    /// `Cache-Control` max-age for every served asset.
    pub max_age_secs: u64,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            directory: "public".to_string(),
            max_age_secs: DEFAULT_ASSET_MAX_AGE_SECS,
        }
    }
}

/// A named pool of backing-store connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Logical name handlers use for lookup (e.g. "db", "cache").
    pub name: String,

    /// Backing store address (e.g. "127.0.0.1:5432").
    pub address: String,

    /// Maximum instances alive at once.
    #[serde(default = "default_pool_capacity")]
    pub capacity: usize,

    /// How long a request waits for a free instance. Zero fails immediately.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_pool_capacity() -> usize {
    64
}

fn default_acquire_timeout_ms() -> u64 {
    3_000
}

/// Roles installed at the start of every dynamic request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoleBaseline {
    /// The single "all access" role `*`.
    #[default]
    Wildcard,
    /// No roles.
    Empty,
}

/// Authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub baseline: RoleBaseline,
}

/// Telemetry sink configuration. Without an endpoint, reporting is skipped.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Collector URL receiving diagnostic records.
    pub endpoint: Option<String>,

    /// Credential sent with every record.
    pub api_key: Option<String>,

    /// Project identity used when the request does not resolve one.
    pub project: String,

    /// Upper bound on a single delivery attempt, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            project: String::new(),
            timeout_ms: 2_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}
