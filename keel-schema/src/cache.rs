//! Model description caching.
//!
//! Loading the same model file twice within a run must parse it once. The
//! cache is keyed by the canonicalized path, so `./models/User.json` and
//! `models/User.json` share an entry.
//!
//! # Examples
//!
//! ```rust,ignore
//! use keel_schema::cache::ModelCache;
//!
//! let cache = ModelCache::new();
//! let user = cache.get_or_load("models/User.json")?;
//! let again = cache.get_or_load("./models/User.json")?;
//! // `again` is the same Arc as `user`
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ast::ModelDescription;
use crate::error::SchemaResult;
use crate::parser::parse_model_file;

/// A cache of parsed model descriptions, keyed by resolved path.
#[derive(Debug, Default)]
pub struct ModelCache {
    cache: RwLock<HashMap<PathBuf, Arc<ModelDescription>>>,
    stats: RwLock<CacheStats>,
}

/// Statistics for the model cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of models currently cached.
    pub cached_count: usize,
}

impl CacheStats {
    /// Get the cache hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl ModelCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached model or load and cache it.
    ///
    /// Failed loads are not cached.
    pub fn get_or_load(&self, path: impl AsRef<Path>) -> SchemaResult<Arc<ModelDescription>> {
        let key = resolve(path.as_ref());

        if let Some(model) = self.cache.read().get(&key) {
            self.stats.write().hits += 1;
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(parse_model_file(&key)?);
        self.cache.write().insert(key, Arc::clone(&model));
        self.stats.write().misses += 1;

        Ok(model)
    }

    /// Check if a model file is cached.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.cache.read().contains_key(&resolve(path.as_ref()))
    }

    /// Clear the cache.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.cached_count = self.cache.read().len();
        stats
    }

    /// Get the number of cached models.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

/// Resolve a path for use as a cache key.
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_by_resolved_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("User.json");
        std::fs::write(&path, r#"{ "attributes": { "email": "string" } }"#).unwrap();

        let cache = ModelCache::new();
        let first = cache.get_or_load(&path).unwrap();
        let dotted = dir.path().join(".").join("User.json");
        let second = cache.get_or_load(&dotted).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.cached_count, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_load_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = ModelCache::new();
        assert!(cache.get_or_load(&path).is_err());
        assert!(cache.is_empty());
        assert!(!cache.contains(&path));
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Tag.json");
        std::fs::write(&path, "{}").unwrap();

        let cache = ModelCache::new();
        cache.get_or_load(&path).unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
