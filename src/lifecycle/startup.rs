//! Runtime construction.
//!
//! # Responsibilities
//! - Build the multi-threaded Tokio runtime that serves requests
//! - Announce each worker thread as it comes up

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::lifecycle::hooks;

/// Build the serving runtime with `workers` threads (default: one per core).
pub fn build_runtime(workers: Option<usize>) -> std::io::Result<Runtime> {
    build_runtime_with(workers, hooks::worker_started)
}

/// Like [`build_runtime`], calling `on_worker` with the 1-based index of
/// each worker thread. Blocking-pool threads are not announced.
pub fn build_runtime_with<F>(workers: Option<usize>, on_worker: F) -> std::io::Result<Runtime>
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let workers = workers
        .filter(|n| *n > 0)
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(1);

    // Worker threads start first, at build time; later starts are blocking-pool threads.
    let started = Arc::new(AtomicUsize::new(0));
    Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("gateway-worker")
        .enable_all()
        .on_thread_start(move || {
            let index = started.fetch_add(1, Ordering::SeqCst) + 1;
            if index <= workers {
                on_worker(index);
            }
        })
        .build()
}
