//! Lifecycle notifications.

use std::net::SocketAddr;

/// The listener is bound and the server is about to accept traffic.
pub fn server_started(addr: SocketAddr, max_payload_bytes: u64) {
    tracing::info!(
        address = %addr,
        max_payload_bytes,
        pid = std::process::id(),
        "Server started successfully (max payload is {} bytes)",
        max_payload_bytes
    );
}

/// A runtime worker is ready. `index` is 1-based.
pub fn worker_started(index: usize) {
    tracing::info!(worker = index, "Worker {} started successfully", index);
}

pub fn before_reload() {
    tracing::info!("Starting reload...");
}

pub fn after_reload() {
    tracing::info!("Reload completed");
}
