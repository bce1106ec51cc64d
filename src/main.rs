//! API Gateway Core
//!
//! Serves static assets from memory and runs every dynamic request through
//! a pooled-resource lifecycle.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ pipeline ──┬──▶ static asset cache ──▶ 200 + cache headers
//!                                                │
//!                                                └──▶ pools (acquire) ──▶ auth reset ──▶ dispatcher
//!                                                           ▲                                │
//!                                                           └──── release / discard ◀────────┘
//!                                                                        │
//!                                                             on failure: reporter ──▶ telemetry sink
//!                                                                         500 JSON ──▶ client
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use gateway_core::config::load_config;
use gateway_core::lifecycle::{signals, startup};
use gateway_core::observability::init_logging;
use gateway_core::{Gateway, NotFoundDispatcher, Shutdown};

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "Multi-tenant API gateway core", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_logging(&config.observability)?;

    tracing::info!(
        bind_address = %config.server.bind_address,
        mode = ?config.server.mode,
        version = %config.server.version,
        pools = config.pools.len(),
        "Configuration loaded"
    );

    let runtime = startup::build_runtime(config.server.workers)?;
    runtime.block_on(async move {
        let gateway = Gateway::builder(config)
            .configured_pools()
            .dispatcher(Arc::new(NotFoundDispatcher))
            .build()?;
        let listener = gateway.bind().await?;

        let shutdown = Arc::new(Shutdown::new());
        tokio::spawn(signals::listen(shutdown.clone()));

        gateway.run(listener, shutdown.subscribe()).await?;
        tracing::info!("Shutdown complete");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
