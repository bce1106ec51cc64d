//! Pooled-resource request lifecycle for a multi-tenant API gateway.

pub mod assets;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod reporting;

pub use config::schema::GatewayConfig;
pub use dispatch::{Dispatcher, Failure, FailureKind, NotFoundDispatcher, RequestScope, RouteMatch};
pub use http::{Gateway, GatewayBuilder, GatewayRequest, RequestPipeline};
pub use lifecycle::Shutdown;
pub use pool::{ResourceFactory, ResourcePool, ResourceRegistry};
pub use reporting::{ErrorReporter, TelemetrySink};
