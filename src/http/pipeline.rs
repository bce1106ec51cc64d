//! Per-request lifecycle.
//!
//! # Data Flow
//! ```text
//! GatewayRequest
//!     → static asset lookup ── hit ──→ asset response (done)
//!     → check out one handle per pool into RequestScope
//!     → reset authorization to baseline
//!     → Dispatcher::dispatch
//!     → return every handle (discard the faulted one)
//!     → on failure: local log, detached report, 500 body
//! ```
//!
//! # Design Decisions
//! - Handles live in the `RequestScope`; dropping the scope returns them,
//!   so timeouts and client disconnects release resources too
//! - Handler panics are caught here and treated as dispatch failures
//! - Release always happens before the response is produced

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::response::Response;
use futures_util::FutureExt;

use crate::assets::{normalize_path, StaticAssetCache};
use crate::config::{GatewayConfig, RoleBaseline};
use crate::dispatch::{Dispatcher, Failure, RequestScope, RouteMatch};
use crate::http::request::GatewayRequest;
use crate::http::response::{error_response, static_response};
use crate::pool::ResourceRegistry;
use crate::reporting::ErrorReporter;

/// Settings the pipeline reads on every request.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub development: bool,
    pub version: String,
    pub baseline: RoleBaseline,
    pub max_payload_bytes: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            development: config.is_development(),
            version: config.server.version.clone(),
            baseline: config.auth.baseline,
            max_payload_bytes: usize::try_from(config.max_payload_bytes()).unwrap_or(usize::MAX),
        }
    }
}

/// Serves requests: static fast path, then pooled dispatch.
#[derive(Clone)]
pub struct RequestPipeline {
    assets: Arc<StaticAssetCache>,
    registry: Arc<ResourceRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    reporter: Arc<ErrorReporter>,
    settings: Arc<PipelineSettings>,
}

impl RequestPipeline {
    pub fn new(
        assets: Arc<StaticAssetCache>,
        registry: Arc<ResourceRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
        reporter: Arc<ErrorReporter>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            assets,
            registry,
            dispatcher,
            reporter,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Serve one request to completion.
    pub async fn handle(&self, request: GatewayRequest) -> Response {
        if let Some(response) = self.serve_static(&request) {
            return response;
        }

        let mut scope = RequestScope::new(self.settings.baseline);
        let outcome = self.run(&request, &mut scope).await;

        match outcome {
            Ok(response) => {
                scope.resources.release_all();
                response
            }
            Err(failure) => {
                scope.resources.finish(failure.faulted_resource());
                self.fail(&request, &scope, &failure)
            }
        }
    }

    fn serve_static(&self, request: &GatewayRequest) -> Option<Response> {
        let path = normalize_path(request.path())?;
        let asset = self.assets.lookup(&path)?;
        tracing::debug!(path = %path, mime = asset.mime, "Static asset hit");
        Some(static_response(asset, self.assets.max_age_secs()))
    }

    async fn run(&self, request: &GatewayRequest, scope: &mut RequestScope) -> Result<Response, Failure> {
        self.registry.acquire_into(&mut scope.resources).await?;
        scope.auth.reset();

        let dispatched = AssertUnwindSafe(self.dispatcher.dispatch(request, scope))
            .catch_unwind()
            .await;
        match dispatched {
            Ok(result) => result,
            Err(panic) => Err(Failure::dispatch(format!("handler panicked: {}", panic_message(&*panic)))),
        }
    }

    fn fail(&self, request: &GatewayRequest, scope: &RequestScope, failure: &Failure) -> Response {
        tracing::error!(
            request_id = %request.request_id(),
            method = %request.method(),
            path = %request.path(),
            kind = %failure.kind(),
            message = %failure.message(),
            file = failure.file(),
            line = failure.line(),
            "Request failed"
        );

        let route = self.resolve_route(request);
        self.reporter.spawn_report(failure, request, route.as_ref(), scope);

        error_response(failure, self.settings.development, &self.settings.version)
    }

    /// Route lookup for diagnostics only; a panicking resolver counts as no route.
    fn resolve_route(&self, request: &GatewayRequest) -> Option<RouteMatch> {
        std::panic::catch_unwind(AssertUnwindSafe(|| self.dispatcher.resolve(request)))
            .ok()
            .flatten()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
