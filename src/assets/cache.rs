//! In-memory static asset table.
//!
//! # Responsibilities
//! - Snapshot the build-output directory once at startup
//! - Serve lookups by normalized request path without touching disk
//!
//! # Design Decisions
//! - Immutable after load; shared through `Arc` with no locking
//! - A file that cannot be read is logged and left out; startup continues

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path};

use axum::body::Bytes;

use crate::assets::mime;

/// One precomputed file.
#[derive(Debug, Clone)]
pub struct StaticAsset {
    pub body: Bytes,
    pub mime: &'static str,
}

/// Lookup table from request path (e.g. `/app.css`) to file contents.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetCache {
    files: HashMap<String, StaticAsset>,
    max_age_secs: u64,
}

impl StaticAssetCache {
    /// An empty table; every lookup misses.
    pub fn empty(max_age_secs: u64) -> Self {
        Self {
            files: HashMap::new(),
            max_age_secs,
        }
    }

    /// Load every regular file under `directory`, recursively.
    ///
    /// A missing directory yields an empty table.
    pub fn load(directory: &Path, max_age_secs: u64) -> Self {
        let mut cache = Self::empty(max_age_secs);

        if !directory.is_dir() {
            tracing::warn!(directory = %directory.display(), "Static asset directory not found; serving no assets");
            return cache;
        }

        if let Err(e) = cache.scan(directory, directory) {
            tracing::error!(directory = %directory.display(), error = %e, "Static asset scan aborted");
        }

        tracing::info!(
            directory = %directory.display(),
            files = cache.files.len(),
            bytes = cache.total_bytes(),
            "Static assets loaded"
        );
        cache
    }

    fn scan(&mut self, root: &Path, dir: &Path) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::warn!(directory = %dir.display(), error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            if path.is_dir() {
                if let Err(e) = self.scan(root, &path) {
                    tracing::warn!(directory = %path.display(), error = %e, "Skipping unreadable directory");
                }
                continue;
            }

            let Some(key) = request_key(root, &path) else {
                continue;
            };

            match fs::read(&path) {
                Ok(contents) => {
                    self.insert(key, contents, mime::from_path(&path));
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to load static asset; omitting it");
                }
            }
        }
        Ok(())
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, path: impl Into<String>, body: impl Into<Bytes>, mime: &'static str) {
        self.files.insert(
            path.into(),
            StaticAsset {
                body: body.into(),
                mime,
            },
        );
    }

    /// Find the asset served at `path`.
    pub fn lookup(&self, path: &str) -> Option<&StaticAsset> {
        self.files.get(path)
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn total_bytes(&self) -> usize {
        self.files.values().map(|a| a.body.len()).sum()
    }
}

/// Build the `/a/b.css` key for a file below `root`.
fn request_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut key = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                key.push('/');
                key.push_str(part.to_str()?);
            }
            _ => return None,
        }
    }
    Some(key)
}

/// Normalize a request path for lookup.
///
/// Collapses repeated and trailing slashes and resolves `.` segments.
/// Paths that climb with `..` never match an asset.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            part => {
                normalized.push('/');
                normalized.push_str(part);
            }
        }
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    Some(normalized)
}
