//! Failure reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Failure + request + route + RequestScope (roles, breadcrumbs, user, project)
//!     → reporter.rs (build DiagnosticRecord)
//!     → detached task → sink.rs (HTTP collector, bounded by timeout)
//!     → status logged locally; errors swallowed
//! ```

pub mod record;
pub mod reporter;
pub mod sink;

pub use record::{Breadcrumb, DiagnosticRecord, Environment, Severity, User};
pub use reporter::{ErrorReporter, ReportOutcome};
pub use sink::{HttpTelemetrySink, TelemetryError, TelemetrySink};
