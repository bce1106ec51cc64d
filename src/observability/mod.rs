//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!
//! Consumers:
//!     → stdout (pretty for operators, JSON for aggregation)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log events via the trace layer span
//! - Failure diagnostics go to the reporting sink, not here

pub mod logging;

pub use logging::init_logging;
