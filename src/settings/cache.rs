//! In-process cache with explicit invalidation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Entry = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    generation: u64,
}

/// Typed key/value cache shared by clones.
///
/// Entries never expire; writers must call [`invalidate`](Self::invalidate)
/// or [`invalidate_pattern`](Self::invalidate_pattern). Every invalidation
/// bumps a generation counter so a reader that loaded from the database
/// before the write can use [`set_if_current`](Self::set_if_current) and
/// will not repopulate a stale value.
#[derive(Clone, Default)]
pub struct MemoryCache {
    inner: Arc<RwLock<Inner>>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("len", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// The entry under `key`, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let entry = self.read().entries.get(key).cloned()?;
        entry.downcast::<T>().ok()
    }

    pub fn set<T: Any + Send + Sync>(&self, key: &str, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.write().entries.insert(key.to_string(), value.clone());
        value
    }

    /// Number of invalidations so far. Read it before loading a value.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Store `value` only if nothing was invalidated since `generation`.
    ///
    /// The value is returned either way.
    pub fn set_if_current<T: Any + Send + Sync>(&self, key: &str, value: T, generation: u64) -> Arc<T> {
        let value = Arc::new(value);
        let mut inner = self.write();
        if inner.generation == generation {
            inner.entries.insert(key.to_string(), value.clone());
        }
        value
    }

    pub fn invalidate(&self, key: &str) {
        let mut inner = self.write();
        inner.generation += 1;
        inner.entries.remove(key);
    }

    /// Drop every key starting with `prefix`.
    pub fn invalidate_pattern(&self, prefix: &str) {
        let mut inner = self.write();
        inner.generation += 1;
        inner.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.generation += 1;
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_get() {
        let cache = MemoryCache::new();
        cache.set("n", 42u32);
        assert_eq!(cache.get::<u32>("n").as_deref(), Some(&42));
        assert!(cache.get::<String>("n").is_none());
        assert!(cache.get::<u32>("missing").is_none());
    }

    #[test]
    fn test_invalidation() {
        let cache = MemoryCache::new();
        cache.set("config:effective", 1u8);
        cache.set("config:sources", 2u8);
        cache.set("setting:theme", 3u8);

        cache.invalidate("setting:theme");
        assert!(cache.get::<u8>("setting:theme").is_none());

        cache.invalidate_pattern("config:");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let a = MemoryCache::new();
        let b = a.clone();
        a.set("k", "v".to_string());
        assert_eq!(b.get::<String>("k").as_deref().map(String::as_str), Some("v"));
        b.invalidate("k");
        assert!(a.get::<String>("k").is_none());
    }

    #[test]
    fn test_set_if_current_skips_after_invalidation() {
        let cache = MemoryCache::new();
        let before = cache.generation();

        // A write lands between the reader's load and its cache fill.
        cache.invalidate_pattern("config:");

        let value = cache.set_if_current("config:effective", 7u8, before);
        assert_eq!(*value, 7);
        assert!(cache.get::<u8>("config:effective").is_none());

        let now = cache.generation();
        cache.set_if_current("config:effective", 8u8, now);
        assert_eq!(cache.get::<u8>("config:effective").as_deref(), Some(&8));
    }
}
