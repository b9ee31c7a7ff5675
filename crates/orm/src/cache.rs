//! Object cache for models with caching enabled

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::adapter::Row;

/// Cached object entry
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Row,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Objects keyed by model and key value
#[derive(Debug)]
pub struct DataCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DataCache {
    pub fn new() -> Self {
        Self::with_ttl(Some(Duration::from_secs(300)))
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn key(model: &str, key: &Value) -> String {
        format!("{}:{}", model, key)
    }

    pub fn get(&self, model: &str, key: &Value) -> Option<Row> {
        let cache_key = Self::key(model, key);
        let found = self.entries.get(&cache_key).map(|e| e.value().clone());
        match found {
            Some(entry) if self.ttl.map(|ttl| entry.is_expired(ttl)).unwrap_or(false) => {
                self.entries.remove(&cache_key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.data)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, model: &str, key: &Value, data: Row) {
        self.entries.insert(
            Self::key(model, key),
            CacheEntry {
                data,
                created_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, model: &str, key: &Value) {
        self.entries.remove(&Self::key(model, key));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
