//! Telemetry sink transport.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::reporting::record::DiagnosticRecord;

/// Header carrying the collector credential.
const API_KEY_HEADER: &str = "x-telemetry-key";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("telemetry delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("telemetry sink rejected record with status {0}")]
    Rejected(u16),

    #[error("telemetry sink failed: {0}")]
    Other(String),
}

/// Receives diagnostic records. Returns the collector's status code.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn push(&self, record: &DiagnosticRecord) -> Result<u16, TelemetryError>;
}

/// Posts records as JSON to an HTTP collector.
#[derive(Debug, Clone)]
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: Option<String>,
}

impl HttpTelemetrySink {
    pub fn new(endpoint: url::Url, api_key: Option<String>, timeout: Duration) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn push(&self, record: &DiagnosticRecord) -> Result<u16, TelemetryError> {
        let mut request = self.client.post(self.endpoint.clone()).json(record);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let status = request.send().await?.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(TelemetryError::Rejected(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::record::{Breadcrumb, Environment, Severity, User};
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Utc;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    /// Requests received by the collector: api key header and JSON body.
    type Received = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn ingest(State(received): State<Received>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
        let key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        received.lock().unwrap().push((key, body));
        StatusCode::ACCEPTED
    }

    async fn start_collector() -> (SocketAddr, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/ingest", post(ingest))
            .route("/down", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, received)
    }

    fn sink(addr: SocketAddr, path: &str, api_key: Option<&str>) -> HttpTelemetrySink {
        let endpoint = url::Url::parse(&format!("http://{}{}", addr, path)).unwrap();
        HttpTelemetrySink::new(endpoint, api_key.map(str::to_string), Duration::from_secs(2)).unwrap()
    }

    fn record(user: Option<&str>) -> DiagnosticRecord {
        let mut tags = BTreeMap::new();
        tags.insert("method".to_string(), "POST".to_string());
        tags.insert("url".to_string(), "/v1/databases/:db/documents".to_string());
        let mut extras = BTreeMap::new();
        extras.insert("roles".to_string(), serde_json::json!(["*"]));

        DiagnosticRecord {
            event_id: uuid::Uuid::new_v4(),
            namespace: "http".to_string(),
            server: "edge-1".to_string(),
            version: "1.2.3".to_string(),
            severity: Severity::Error,
            message: "collection not found".to_string(),
            action: "databases.createDocument".to_string(),
            environment: Environment::Production,
            timestamp: Utc::now(),
            tags,
            extras,
            breadcrumbs: vec![Breadcrumb::new(Severity::Info, "db", "select documents")],
            user: user.map(|id| User { id: id.to_string() }),
        }
    }

    #[tokio::test]
    async fn test_push_posts_record_with_api_key() {
        let (addr, received) = start_collector().await;

        let status = sink(addr, "/ingest", Some("secret")).push(&record(Some("user-42"))).await.unwrap();
        assert_eq!(status, 202);

        let received = received.lock().unwrap();
        let (key, body) = &received[0];
        assert_eq!(key.as_deref(), Some("secret"));
        for field in ["namespace", "action", "environment", "severity", "tags", "extras", "breadcrumbs", "user"] {
            assert!(body.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(body["namespace"], "http");
        assert_eq!(body["action"], "databases.createDocument");
        assert_eq!(body["environment"], "production");
        assert_eq!(body["tags"]["url"], "/v1/databases/:db/documents");
        assert_eq!(body["extras"]["roles"], serde_json::json!(["*"]));
        assert_eq!(body["breadcrumbs"][0]["category"], "db");
        assert_eq!(body["user"]["id"], "user-42");
    }

    #[tokio::test]
    async fn test_push_without_api_key_or_user() {
        let (addr, received) = start_collector().await;

        sink(addr, "/ingest", None).push(&record(None)).await.unwrap();

        let received = received.lock().unwrap();
        let (key, body) = &received[0];
        assert!(key.is_none());
        assert!(body.get("user").is_none());
    }

    #[tokio::test]
    async fn test_push_maps_error_status_to_rejected() {
        let (addr, _) = start_collector().await;

        let result = sink(addr, "/down", Some("secret")).push(&record(None)).await;
        assert!(matches!(result, Err(TelemetryError::Rejected(503))));
    }

    #[tokio::test]
    async fn test_push_unreachable_collector_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = sink(addr, "/ingest", None).push(&record(None)).await;
        assert!(matches!(result, Err(TelemetryError::Transport(_))));
    }
}
