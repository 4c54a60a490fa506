//! Cache handle for plan results.
//!
//! The core holds no cache state: callers pass a [`PlanCache`] handle
//! into the planning call (see [`crate::planner::sql_with_cache`]) and
//! own storage, eviction, and tiering. This module only defines the
//! handle and the deterministic key scheme.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 content hash of a serializable value.
///
/// The value is serialized to JSON first, so identical content hashes
/// identically across processes. Returns a 64-character lowercase hex
/// string.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Cache key for a category and its ordered arguments.
///
/// `category:sha256(args)` - deterministic, and sensitive to argument
/// order so reordered requests do not collide.
pub fn cache_key(category: &str, args: &[String]) -> String {
    let hash = compute_hash(&args).unwrap_or_default();
    format!("{}:{}", category, hash)
}

/// Externally owned cache the planning call can be wrapped with.
pub trait PlanCache {
    /// Look up a previously stored value.
    fn get(&self, key: &str) -> Option<String>;
    /// Store a value. Eviction policy belongs to the implementation.
    fn put(&self, key: &str, value: String);
}

/// Cache handle that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl PlanCache for NoopCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn put(&self, _key: &str, _value: String) {}
}

/// Simple in-process cache, mainly for tests and single-process callers.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlanCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
    }
}
