//! Diagnostic record shipped to the telemetry sink.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Deployment classification attached to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// A trail entry recorded while a request was being served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breadcrumb {
    pub level: Severity,
    pub category: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Breadcrumb {
    pub fn new(level: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            category: category.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
}

/// Structured description of one failed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    /// Unique per record; also written to the gateway log for correlation.
    pub event_id: Uuid,
    pub namespace: String,
    pub server: String,
    pub version: String,
    pub severity: Severity,
    pub message: String,
    /// `<namespace>.<method>` label pair of the matched route.
    pub action: String,
    pub environment: Environment,
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub extras: BTreeMap<String, Value>,
    pub breadcrumbs: Vec<Breadcrumb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl DiagnosticRecord {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }
}
