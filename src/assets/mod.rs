//! Static asset fast path.
//!
//! # Data Flow
//! ```text
//! startup: build-output directory → cache.rs (read every file, mime.rs per extension)
//! request: normalized path → cache.rs lookup → hit: bytes + headers, no pool work
//! ```

pub mod cache;
pub mod mime;

pub use cache::{normalize_path, StaticAsset, StaticAssetCache};
