//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway_core::config::GatewayConfig;
use gateway_core::dispatch::{Dispatcher, Failure, RequestScope, RouteMatch};
use gateway_core::pool::{BoxError, ResourceFactory, ResourcePool};
use gateway_core::reporting::{DiagnosticRecord, TelemetryError, TelemetrySink};
use gateway_core::{Gateway, GatewayRequest, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Hands out increasing connection numbers.
#[derive(Default)]
pub struct Sequence(AtomicU64);

#[async_trait]
impl ResourceFactory<u64> for Sequence {
    async fn create(&self) -> Result<u64, BoxError> {
        Ok(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

pub fn db_pool(capacity: usize) -> ResourcePool<u64> {
    ResourcePool::new("db", capacity, Duration::from_secs(5), Sequence::default())
}

/// Dispatcher with a few fixed routes.
///
/// - `/v1/ok` answers with the checked-out db connection number
/// - `/v1/fail` fails with a dispatch error
/// - `/v1/slow` sleeps before answering
/// - `/v1/busy` records the peak number of db handles in use
pub struct ScriptedDispatcher {
    pub db: ResourcePool<u64>,
    pub peak_outstanding: AtomicUsize,
}

impl ScriptedDispatcher {
    pub fn new(db: ResourcePool<u64>) -> Arc<Self> {
        Arc::new(Self {
            db,
            peak_outstanding: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn dispatch(
        &self,
        request: &GatewayRequest,
        scope: &mut RequestScope,
    ) -> Result<Response, Failure> {
        let db = scope
            .resources
            .get::<u64>("db")
            .copied()
            .ok_or_else(|| Failure::dispatch("db handle missing"))?;

        match request.path() {
            "/v1/ok" => Ok(db.to_string().into_response()),
            "/v1/fail" => {
                scope.set_user("user-42");
                Err(Failure::dispatch("collection not found"))
            }
            "/v1/slow" => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok("slow".into_response())
            }
            "/v1/busy" => {
                let outstanding = self.db.stats().outstanding;
                self.peak_outstanding.fetch_max(outstanding, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok("busy".into_response())
            }
            _ => Ok(StatusCode::NOT_FOUND.into_response()),
        }
    }

    fn resolve(&self, request: &GatewayRequest) -> Option<RouteMatch> {
        (request.path() == "/v1/fail").then(|| {
            RouteMatch::new("POST", "/v1/databases/:db/documents")
                .with_label("sdk.namespace", "databases")
                .with_label("sdk.method", "createDocument")
        })
    }
}

/// Keeps every record it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<DiagnosticRecord>>,
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn push(&self, record: &DiagnosticRecord) -> Result<u16, TelemetryError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(202)
    }
}

impl RecordingSink {
    /// Wait until at least `count` records arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<DiagnosticRecord> {
        for _ in 0..100 {
            {
                let records = self.records.lock().unwrap();
                if records.len() >= count {
                    return records.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} diagnostic records", count);
    }
}

/// Rejects every record.
pub struct FailingSink;

#[async_trait]
impl TelemetrySink for FailingSink {
    async fn push(&self, _record: &DiagnosticRecord) -> Result<u16, TelemetryError> {
        Err(TelemetryError::Rejected(503))
    }
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Arc<Shutdown>,
    pub server: JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a gateway on an ephemeral port.
pub async fn start_gateway(
    config: GatewayConfig,
    db: ResourcePool<u64>,
    dispatcher: Arc<dyn Dispatcher>,
    sink: Option<Arc<dyn TelemetrySink>>,
) -> TestGateway {
    let mut builder = Gateway::builder(config).pool(db).dispatcher(dispatcher);
    if let Some(sink) = sink {
        builder = builder.telemetry_sink(sink);
    }
    let gateway = builder.build().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let server = tokio::spawn(gateway.run(listener, shutdown.subscribe()));

    TestGateway {
        addr,
        shutdown,
        server,
    }
}

/// Config with an empty asset directory.
pub fn test_config(assets: &std::path::Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.version = "1.2.3".to_string();
    config.assets.directory = assets.display().to_string();
    config
}
