//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, body buffering)
//!     → request.rs (owned GatewayRequest with request ID)
//!     → pipeline.rs (static fast path, pooled dispatch, guaranteed release)
//!     → response.rs (asset headers, JSON error body)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{PipelineSettings, RequestPipeline};
pub use request::{GatewayRequest, X_LOCALE, X_REQUEST_ID};
pub use server::{Gateway, GatewayBuilder, GatewayError};
