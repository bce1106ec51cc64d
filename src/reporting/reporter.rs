//! Builds diagnostic records for failed requests and ships them.
//!
//! # Design Decisions
//! - Best effort: nothing here can fail the response path. Delivery errors,
//!   timeouts and sink panics end as a local log line.
//! - The pipeline spawns delivery on its own task; the client never waits
//!   on the collector.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{GatewayConfig, RuntimeMode};
use crate::dispatch::{Failure, RequestScope, RouteMatch};
use crate::http::request::GatewayRequest;
use crate::reporting::record::{DiagnosticRecord, Environment, Severity, User};
use crate::reporting::sink::{HttpTelemetrySink, TelemetryError, TelemetrySink};

/// Namespace of every record produced by the serving layer.
pub const NAMESPACE: &str = "http";

/// Route label naming the API namespace of an action.
pub const LABEL_NAMESPACE: &str = "sdk.namespace";

/// Route label naming the API method of an action.
pub const LABEL_METHOD: &str = "sdk.method";

/// Result of one report attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The sink accepted the record.
    Delivered { status: u16 },
    /// No sink is configured.
    Skipped,
    /// Delivery failed; already logged.
    Failed,
}

/// Turns failures into [`DiagnosticRecord`]s for an optional sink.
pub struct ErrorReporter {
    sink: Option<Arc<dyn TelemetrySink>>,
    server: String,
    version: String,
    environment: Environment,
    project: String,
    timeout: Duration,
}

impl ErrorReporter {
    pub fn new(
        sink: Option<Arc<dyn TelemetrySink>>,
        version: impl Into<String>,
        environment: Environment,
        timeout: Duration,
    ) -> Self {
        Self {
            sink,
            server: host_identity(),
            version: version.into(),
            environment,
            project: String::new(),
            timeout,
        }
    }

    /// Build from configuration, with an HTTP sink when an endpoint is set.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, TelemetryError> {
        let timeout = Duration::from_millis(config.telemetry.timeout_ms);
        let sink: Option<Arc<dyn TelemetrySink>> = match &config.telemetry.endpoint {
            Some(endpoint) => {
                let endpoint = url::Url::parse(endpoint)
                    .map_err(|e| TelemetryError::Other(format!("invalid endpoint: {}", e)))?;
                Some(Arc::new(HttpTelemetrySink::new(
                    endpoint,
                    config.telemetry.api_key.clone(),
                    timeout,
                )?))
            }
            None => None,
        };

        let environment = match config.server.mode {
            RuntimeMode::Production => Environment::Production,
            RuntimeMode::Development => Environment::Staging,
        };

        Ok(Self::new(sink, config.server.version.clone(), environment, timeout)
            .with_project(config.telemetry.project.clone()))
    }

    /// Project identity used when the request did not resolve one.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Deliver to `sink` instead of the configured one.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the server identity (defaults to the host name).
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Describe `failure` as seen while serving `request`.
    pub fn build_record(
        &self,
        failure: &Failure,
        request: &GatewayRequest,
        route: Option<&RouteMatch>,
        scope: &RequestScope,
    ) -> DiagnosticRecord {
        let (method, path) = match route {
            Some(route) => (route.method.clone(), route.path.clone()),
            None => (request.method().to_string(), request.path().to_string()),
        };

        let action = match route {
            Some(route) => format!(
                "{}.{}",
                route.label(LABEL_NAMESPACE, "UNKNOWN_NAMESPACE"),
                route.label(LABEL_METHOD, "UNKNOWN_METHOD")
            ),
            None => "UNKNOWN_NAMESPACE.UNKNOWN_METHOD".to_string(),
        };

        let project = scope.project().unwrap_or(self.project.as_str()).to_string();

        let mut tags = BTreeMap::new();
        tags.insert("method".to_string(), method);
        tags.insert("url".to_string(), path);
        tags.insert("kind".to_string(), failure.kind().to_string());
        tags.insert("code".to_string(), failure.code().to_string());
        tags.insert("projectId".to_string(), project);
        tags.insert("hostname".to_string(), request.hostname());
        tags.insert("locale".to_string(), request.locale());

        let mut extras = BTreeMap::new();
        extras.insert("file".to_string(), Value::from(failure.file()));
        extras.insert("line".to_string(), Value::from(failure.line()));
        extras.insert("trace".to_string(), Value::from(failure.trace()));
        extras.insert("roles".to_string(), Value::from(scope.auth.snapshot()));

        let user = scope
            .user()
            .filter(|id| !id.is_empty())
            .map(|id| User { id: id.to_string() });

        DiagnosticRecord {
            event_id: Uuid::new_v4(),
            namespace: NAMESPACE.to_string(),
            server: self.server.clone(),
            version: self.version.clone(),
            severity: Severity::Error,
            message: failure.message().to_string(),
            action,
            environment: self.environment,
            timestamp: Utc::now(),
            tags,
            extras,
            breadcrumbs: scope.breadcrumbs().to_vec(),
            user,
        }
    }

    /// Build and deliver a record, waiting at most the configured timeout.
    pub async fn report(
        &self,
        failure: &Failure,
        request: &GatewayRequest,
        route: Option<&RouteMatch>,
        scope: &RequestScope,
    ) -> ReportOutcome {
        if self.sink.is_none() {
            return ReportOutcome::Skipped;
        }
        let record = self.build_record(failure, request, route, scope);
        self.deliver(record).await
    }

    /// Like [`report`](Self::report), but delivery runs on a detached task.
    ///
    /// Returns `None` when reporting is skipped.
    pub fn spawn_report(
        self: &Arc<Self>,
        failure: &Failure,
        request: &GatewayRequest,
        route: Option<&RouteMatch>,
        scope: &RequestScope,
    ) -> Option<JoinHandle<ReportOutcome>> {
        if self.sink.is_none() {
            return None;
        }
        let record = self.build_record(failure, request, route, scope);
        let reporter = Arc::clone(self);
        Some(tokio::spawn(async move { reporter.deliver(record).await }))
    }

    /// Push a record to the sink. Never fails; problems are logged.
    pub async fn deliver(&self, record: DiagnosticRecord) -> ReportOutcome {
        let Some(sink) = &self.sink else {
            return ReportOutcome::Skipped;
        };

        let attempt = AssertUnwindSafe(sink.push(&record)).catch_unwind();
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(Ok(status))) => {
                tracing::info!(status, event_id = %record.event_id, action = %record.action, "Diagnostic record pushed");
                ReportOutcome::Delivered { status }
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, event_id = %record.event_id, "Diagnostic record not delivered");
                ReportOutcome::Failed
            }
            Ok(Err(_)) => {
                tracing::warn!(event_id = %record.event_id, "Telemetry sink panicked");
                ReportOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    error = %TelemetryError::Timeout(self.timeout),
                    event_id = %record.event_id,
                    "Diagnostic record not delivered"
                );
                ReportOutcome::Failed
            }
        }
    }
}

/// Name of this host for the record's server field.
pub fn host_identity() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/proc/sys/kernel/hostname").ok())
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleBaseline;
    use crate::reporting::record::Breadcrumb;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, Method};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        records: Mutex<Vec<DiagnosticRecord>>,
    }

    #[async_trait]
    impl TelemetrySink for Recording {
        async fn push(&self, record: &DiagnosticRecord) -> Result<u16, TelemetryError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(202)
        }
    }

    struct Failing;

    #[async_trait]
    impl TelemetrySink for Failing {
        async fn push(&self, _record: &DiagnosticRecord) -> Result<u16, TelemetryError> {
            Err(TelemetryError::Other("collector down".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl TelemetrySink for Panicking {
        async fn push(&self, _record: &DiagnosticRecord) -> Result<u16, TelemetryError> {
            panic!("sink bug");
        }
    }

    struct Stalled;

    #[async_trait]
    impl TelemetrySink for Stalled {
        async fn push(&self, _record: &DiagnosticRecord) -> Result<u16, TelemetryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(200)
        }
    }

    fn request() -> GatewayRequest {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("tenant.example.com"));
        headers.insert("x-gateway-locale", HeaderValue::from_static("pt-BR"));
        GatewayRequest::new(
            Method::POST,
            "/v1/databases/main/documents".parse().unwrap(),
            headers,
            Bytes::new(),
        )
    }

    fn scope() -> RequestScope {
        let mut scope = RequestScope::new(RoleBaseline::Wildcard);
        scope.auth.reset();
        scope.auth.add_role("user:7");
        scope.set_user("7");
        scope.set_project("proj-1");
        scope.add_breadcrumb(Breadcrumb::new(Severity::Info, "db", "select documents"));
        scope
    }

    fn reporter(sink: Option<Arc<dyn TelemetrySink>>) -> ErrorReporter {
        ErrorReporter::new(sink, "1.2.3", Environment::Production, Duration::from_millis(100))
            .with_server("node-a")
    }

    #[test]
    fn test_record_carries_request_context() {
        let failure = Failure::dispatch("document not writable").with_code(409);
        let route = RouteMatch::new("POST", "/v1/databases/:db/documents")
            .with_label(LABEL_NAMESPACE, "databases")
            .with_label(LABEL_METHOD, "createDocument");

        let record = reporter(None).build_record(&failure, &request(), Some(&route), &scope());

        assert_eq!(record.namespace, "http");
        assert_eq!(record.server, "node-a");
        assert_eq!(record.version, "1.2.3");
        assert_eq!(record.severity, Severity::Error);
        assert_eq!(record.message, "document not writable");
        assert_eq!(record.action, "databases.createDocument");
        assert_eq!(record.environment, Environment::Production);

        assert_eq!(record.tag("method"), Some("POST"));
        assert_eq!(record.tag("url"), Some("/v1/databases/:db/documents"));
        assert_eq!(record.tag("kind"), Some("DispatchFailure"));
        assert_eq!(record.tag("code"), Some("409"));
        assert_eq!(record.tag("projectId"), Some("proj-1"));
        assert_eq!(record.tag("hostname"), Some("tenant.example.com"));
        assert_eq!(record.tag("locale"), Some("pt-BR"));

        assert_eq!(record.extra("roles"), Some(&serde_json::json!(["*", "user:7"])));
        assert_eq!(record.extra("line"), Some(&Value::from(failure.line())));
        assert!(record.extra("file").is_some());
        assert!(record.extra("trace").is_some());

        assert_eq!(record.breadcrumbs.len(), 1);
        assert_eq!(record.user, Some(User { id: "7".into() }));
    }

    #[test]
    fn test_record_without_route_or_user() {
        let mut scope = RequestScope::new(RoleBaseline::Empty);
        scope.set_user("");
        let failure = Failure::dispatch("boom");

        let record = reporter(None)
            .with_project("fallback")
            .build_record(&failure, &request(), None, &scope);

        assert_eq!(record.action, "UNKNOWN_NAMESPACE.UNKNOWN_METHOD");
        assert_eq!(record.tag("method"), Some("POST"));
        assert_eq!(record.tag("url"), Some("/v1/databases/main/documents"));
        assert_eq!(record.tag("projectId"), Some("fallback"));
        assert!(record.user.is_none());
        assert_eq!(record.extra("roles"), Some(&serde_json::json!([])));
    }

    #[tokio::test]
    async fn test_skipped_without_sink() {
        let failure = Failure::dispatch("boom");
        let outcome = reporter(None).report(&failure, &request(), None, &scope()).await;
        assert_eq!(outcome, ReportOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_delivered_to_sink() {
        let sink = Arc::new(Recording::default());
        let reporter = Arc::new(reporter(Some(sink.clone())));
        let failure = Failure::dispatch("boom");

        let task = reporter.spawn_report(&failure, &request(), None, &scope()).unwrap();
        assert_eq!(task.await.unwrap(), ReportOutcome::Delivered { status: 202 });

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "boom");
    }

    #[tokio::test]
    async fn test_sink_errors_are_swallowed() {
        let failure = Failure::dispatch("boom");
        let sinks: [Arc<dyn TelemetrySink>; 3] =
            [Arc::new(Failing), Arc::new(Panicking), Arc::new(Stalled)];
        for sink in sinks {
            let outcome = reporter(Some(sink)).report(&failure, &request(), None, &scope()).await;
            assert_eq!(outcome, ReportOutcome::Failed);
        }
    }
}
