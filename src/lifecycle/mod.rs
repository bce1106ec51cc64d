//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build runtime (worker hooks) → Assemble gateway → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Close pools → Exit
//!
//! Signals (signals.rs):
//!     SIGINT → Trigger graceful shutdown
//!     SIGHUP → Reload notifications (reload itself belongs to the host)
//! ```
//!
//! # Design Decisions
//! - Listeners start last (traffic only when ready)
//! - In-flight requests finish and release their handles before pools close

pub mod hooks;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
