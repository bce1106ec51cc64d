//! Connection pooling subsystem.
//!
//! # Data Flow
//! ```text
//! Dynamic request
//!     → registry.rs (check out one handle per registered pool, in order)
//!     → resource_pool.rs (reuse idle instance or construct one, bounded)
//!     → ResourceSet handed to the dispatcher by logical name ("db", "cache")
//!     → request ends: every handle released, or discarded if faulted
//! ```
//!
//! # Design Decisions
//! - Checkout is fail-fast after a bounded wait; no retries
//! - Handles are RAII guards: release runs on every exit path
//! - Release and discard consume the handle, so double release does not compile

pub mod registry;
pub mod resource_pool;
pub mod tcp;

pub use registry::{ErasedHandle, PoolSource, ResourceRegistry, ResourceSet};
pub use resource_pool::{BoxError, PoolError, PoolStats, PooledHandle, ResourceFactory, ResourcePool};
pub use tcp::TcpConnector;
