//! OS signal handling.
//!
//! # Responsibilities
//! - Ctrl+C (SIGINT) triggers graceful shutdown
//! - SIGHUP brackets a host-driven reload with before/after notifications

use std::sync::Arc;

use crate::lifecycle::hooks;
use crate::lifecycle::Shutdown;

/// Wait for signals until shutdown is requested.
pub async fn listen(shutdown: Arc<Shutdown>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Stop by Ctrl+C"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C; shutting down"),
            }
        }
        _ = reloads() => {}
    }
    shutdown.trigger();
}

#[cfg(unix)]
async fn reloads() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "SIGHUP handler unavailable");
            return std::future::pending().await;
        }
    };

    while hangup.recv().await.is_some() {
        hooks::before_reload();
        hooks::after_reload();
    }
    std::future::pending::<()>().await
}

#[cfg(not(unix))]
async fn reloads() {
    std::future::pending::<()>().await
}
