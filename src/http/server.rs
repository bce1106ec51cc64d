//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the gateway from config: pools, assets, reporter, dispatcher
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, body limit, timeout, compression)
//! - Serve until shutdown, drain in-flight requests, then close pools

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::assets::StaticAssetCache;
use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::http::pipeline::{PipelineSettings, RequestPipeline};
use crate::http::request::GatewayRequest;
use crate::lifecycle::{hooks, ShutdownSignal};
use crate::pool::{ResourcePool, ResourceRegistry, TcpConnector};
use crate::reporting::{ErrorReporter, TelemetryError, TelemetrySink};

/// Upper bound on opening one backing-store connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors assembling a [`Gateway`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no dispatcher configured")]
    MissingDispatcher,

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    registry: ResourceRegistry,
    assets: Option<StaticAssetCache>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl GatewayBuilder {
    /// Register a pool; pools are checked out in registration order.
    pub fn pool<T: Send + Sync + 'static>(mut self, pool: ResourcePool<T>) -> Self {
        self.registry.register(pool);
        self
    }

    /// Register a TCP connection pool for every `[[pools]]` entry.
    pub fn configured_pools(mut self) -> Self {
        for pool in &self.config.pools {
            let timeout = Duration::from_millis(pool.acquire_timeout_ms);
            let connector = TcpConnector::new(pool.address.clone(), CONNECT_TIMEOUT);
            self.registry
                .register(ResourcePool::new(pool.name.clone(), pool.capacity, timeout, connector));
        }
        self
    }

    /// Use a prepared asset table instead of scanning the configured directory.
    pub fn assets(mut self, assets: StaticAssetCache) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Use this sink instead of the configured HTTP collector.
    pub fn telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Gateway, GatewayError> {
        let dispatcher = self.dispatcher.ok_or(GatewayError::MissingDispatcher)?;

        let assets = self.assets.unwrap_or_else(|| {
            StaticAssetCache::load(Path::new(&self.config.assets.directory), self.config.assets.max_age_secs)
        });

        let mut reporter = ErrorReporter::from_config(&self.config)?;
        if let Some(sink) = self.sink {
            reporter = reporter.with_sink(sink);
        }

        tracing::info!(
            pools = ?self.registry,
            assets = assets.len(),
            telemetry = reporter.is_enabled(),
            "Gateway assembled"
        );

        let registry = Arc::new(self.registry);
        let pipeline = RequestPipeline::new(
            Arc::new(assets),
            registry.clone(),
            dispatcher,
            Arc::new(reporter),
            PipelineSettings::from_config(&self.config),
        );
        let router = Gateway::build_router(&self.config, pipeline.clone());

        Ok(Gateway {
            router,
            config: self.config,
            pipeline,
            registry,
        })
    }
}

/// The HTTP front of the gateway.
pub struct Gateway {
    router: Router,
    config: GatewayConfig,
    pipeline: RequestPipeline,
    registry: Arc<ResourceRegistry>,
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder {
            config,
            registry: ResourceRegistry::new(),
            assets: None,
            dispatcher: None,
            sink: None,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, pipeline: RequestPipeline) -> Router {
        let payload = pipeline.settings().max_payload_bytes;
        let router = Router::new()
            .fallback(gateway_handler)
            .with_state(pipeline)
            .layer(RequestBodyLimitLayer::new(payload))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.server.request_timeout_secs),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        if config.server.compression {
            router.layer(CompressionLayer::new().gzip(true))
        } else {
            router
        }
    }

    /// The router, for serving on a custom transport or in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Bind the configured address. Call after [`GatewayBuilder::build`] so
    /// the listener only exists once assets and pools are ready.
    pub async fn bind(&self) -> Result<TcpListener, std::io::Error> {
        TcpListener::bind(&self.config.server.bind_address).await
    }

    /// Serve until `shutdown` fires, then drain in-flight requests and close pools.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        hooks::server_started(addr, self.config.max_payload_bytes());

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received; draining in-flight requests");
            })
            .await?;

        self.registry.close_all();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: buffer the body and run the pipeline.
async fn gateway_handler(State(pipeline): State<RequestPipeline>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let limit = pipeline.settings().max_payload_bytes;

    let body = match axum::body::to_bytes(body, limit).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large or incomplete").into_response();
        }
    };

    pipeline.handle(GatewayRequest::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Failure, RequestScope};
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::header;
    use tower::ServiceExt;

    struct Echo;

    #[async_trait]
    impl Dispatcher for Echo {
        async fn dispatch(
            &self,
            request: &GatewayRequest,
            _scope: &mut RequestScope,
        ) -> Result<Response, Failure> {
            Ok(format!("{} bytes", request.body().len()).into_response())
        }
    }

    struct Stalled;

    #[async_trait]
    impl Dispatcher for Stalled {
        async fn dispatch(
            &self,
            _request: &GatewayRequest,
            _scope: &mut RequestScope,
        ) -> Result<Response, Failure> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".into_response())
        }
    }

    fn gateway() -> Gateway {
        let mut assets = StaticAssetCache::empty(63_072_000);
        assets.insert("/app.css", Bytes::from_static(b"body{}"), "text/css");
        Gateway::builder(GatewayConfig::default())
            .assets(assets)
            .dispatcher(Arc::new(Echo))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_bind_uses_configured_address() {
        let mut config = GatewayConfig::default();
        config.server.bind_address = "127.0.0.1:0".to_string();
        let gateway = Gateway::builder(config)
            .assets(StaticAssetCache::empty(60))
            .dispatcher(Arc::new(Echo))
            .build()
            .unwrap();

        let addr = gateway.bind().await.unwrap().local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_slow_request_times_out_with_408() {
        let mut config = GatewayConfig::default();
        config.server.request_timeout_secs = 1;
        let gateway = Gateway::builder(config)
            .assets(StaticAssetCache::empty(60))
            .dispatcher(Arc::new(Stalled))
            .build()
            .unwrap();

        let response = gateway
            .router()
            .oneshot(Request::get("/v1/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_build_requires_dispatcher() {
        let result = Gateway::builder(GatewayConfig::default()).build();
        assert!(matches!(result, Err(GatewayError::MissingDispatcher)));
    }

    #[tokio::test]
    async fn test_router_serves_assets_and_sets_request_id() {
        let response = gateway()
            .router()
            .oneshot(Request::get("/app.css").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_router_passes_body_to_dispatcher() {
        let response = gateway()
            .router()
            .oneshot(Request::post("/v1/things").body(Body::from("hello")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"5 bytes");
    }

    #[tokio::test]
    async fn test_router_rejects_oversized_body() {
        let gateway = gateway();
        let limit = gateway.pipeline().settings().max_payload_bytes;
        let body = vec![b'x'; limit + 1];

        let response = gateway
            .router()
            .oneshot(
                Request::post("/v1/upload")
                    .header(header::CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
