//! In-memory schema definition cache with TTL expiry and LRU eviction.
//!
//! The cache maps a normalized schema path to its parsed definition together
//! with freshness bookkeeping: insertion time, the backing file's
//! modification time as observed at insertion, and access statistics. A
//! present entry is either fresher than the configured TTL and matches the
//! current file modification time, or it is treated as absent and evicted on
//! the spot.
//!
//! All interior state lives behind a single `Mutex`, so a shared
//! `Arc<SchemaCache>` is safe to consult from concurrent per-document
//! pipeline runs. Contention is expected to be low given TTL-dominated churn.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use crate::core::{MatterpipeError, Result};
use crate::utils::normalize_path;

/// Which entries go first when the cache is over capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Evict by least recent access (default).
    #[default]
    LeastRecentlyUsed,
    /// Evict the entries cached longest ago, regardless of access.
    OldestFirst,
}

/// Tuning knobs for [`SchemaCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries older than this are treated as misses and evicted.
    pub ttl: Duration,
    /// Hard upper bound on the number of cached definitions.
    pub max_entries: usize,
    /// Eviction order when over capacity.
    pub eviction_policy: EvictionPolicy,
    /// When true, skip per-get modification-time checks (an external file
    /// watcher is assumed to call [`SchemaCache::invalidate`] instead).
    pub watch_files: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 128,
            eviction_policy: EvictionPolicy::default(),
            watch_files: false,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    definition: Value,
    cached_at: Instant,
    source_mtime: Option<SystemTime>,
    access_count: u64,
    last_accessed_at: Instant,
    approx_bytes: usize,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<PathBuf, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Read-only snapshot of cache counters for observability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    /// Number of `get` calls that returned a fresh entry.
    pub hits: u64,
    /// Number of `get` calls that found nothing usable.
    pub misses: u64,
    /// Entries removed by TTL expiry, staleness, or capacity pressure.
    pub evictions: u64,
    /// Entries currently resident.
    pub entries: usize,
    /// Rough memory footprint of cached definitions, in bytes.
    pub approx_bytes: usize,
}

impl CacheStats {
    /// Hit rate as a fraction in `[0, 1]`; zero when no lookups happened.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Key/value store for resolved schema definitions.
///
/// See the module docs for the freshness contract. All operations are total:
/// a file-stat failure on [`set`](SchemaCache::set) is reported as a
/// [`MatterpipeError::Cache`] but never corrupts existing entries.
#[derive(Debug)]
pub struct SchemaCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl SchemaCache {
    /// Create an empty cache with the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Look up a cached definition by path.
    ///
    /// Misses on: absent entry, TTL expiry, or (when file watching is
    /// disabled) a backing-file modification time that no longer matches the
    /// one recorded at set time. Expired and stale entries are evicted as a
    /// side effect so they cannot be observed again.
    pub async fn get(&self, path: &Path) -> Option<Value> {
        let key = normalize_path(path);
        let current_mtime = if self.config.watch_files {
            None
        } else {
            file_mtime(path).await
        };

        let mut inner = self.lock();
        let freshness = match inner.entries.get(&key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => {
                if entry.cached_at.elapsed() >= self.config.ttl {
                    Err("expired by TTL")
                } else if !self.config.watch_files && entry.source_mtime != current_mtime {
                    Err("backing file changed")
                } else {
                    Ok(())
                }
            }
        };

        if let Err(why) = freshness {
            tracing::debug!(path = %key.display(), why, "evicting unusable cache entry");
            inner.entries.remove(&key);
            inner.evictions += 1;
            inner.misses += 1;
            return None;
        }

        inner.hits += 1;
        let entry = inner.entries.get_mut(&key)?;
        entry.access_count += 1;
        entry.last_accessed_at = Instant::now();
        Some(entry.definition.clone())
    }

    /// Insert or replace the definition cached for `path`.
    ///
    /// Records the backing file's current modification time so later `get`
    /// calls can detect staleness. Evicts before inserting when at capacity,
    /// removing roughly 10% of capacity per pass to amortize the cost.
    pub async fn set(&self, path: &Path, definition: Value) -> Result<()> {
        if self.config.max_entries == 0 {
            return Ok(());
        }

        let key = normalize_path(path);
        let source_mtime = if self.config.watch_files {
            None
        } else {
            match tokio::fs::metadata(path).await {
                Ok(meta) => meta.modified().ok(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    return Err(MatterpipeError::Cache {
                        operation: "set".into(),
                        path: key.display().to_string(),
                        reason: format!("failed to stat backing file: {e}"),
                    });
                }
            }
        };

        let approx_bytes = serde_json::to_string(&definition).map(|s| s.len()).unwrap_or(0);
        let now = Instant::now();

        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_entries {
            self.evict_locked(&mut inner);
        }
        inner.entries.insert(
            key,
            CacheEntry {
                definition,
                cached_at: now,
                source_mtime,
                access_count: 0,
                last_accessed_at: now,
                approx_bytes,
            },
        );
        Ok(())
    }

    /// Drop the entry for `path`, if any. Returns whether one was removed.
    pub fn invalidate(&self, path: &Path) -> bool {
        let key = normalize_path(path);
        let mut inner = self.lock();
        let removed = inner.entries.remove(&key).is_some();
        if removed {
            inner.evictions += 1;
        }
        removed
    }

    /// Drop every entry. Counters are preserved.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let count = inner.entries.len() as u64;
        inner.entries.clear();
        inner.evictions += count;
    }

    /// Sweep out TTL-expired entries. Returns how many were removed.
    pub fn perform_maintenance(&self) -> usize {
        let ttl = self.config.ttl;
        let mut inner = self.lock();
        let expired: Vec<PathBuf> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.cached_at.elapsed() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.entries.remove(key);
        }
        inner.evictions += expired.len() as u64;
        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "cache maintenance sweep");
        }
        expired.len()
    }

    /// Snapshot of the current counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            entries: inner.entries.len(),
            approx_bytes: inner.entries.values().map(|e| e.approx_bytes).sum(),
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // A poisoned lock means a panic mid-update; the map itself is still
        // structurally sound, so keep serving rather than cascading panics.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Remove ~10% of capacity (at least one entry) in policy order.
    fn evict_locked(&self, inner: &mut CacheInner) {
        let batch = (self.config.max_entries / 10).max(1);
        let mut candidates: Vec<(PathBuf, Instant)> = inner
            .entries
            .iter()
            .map(|(key, entry)| {
                let rank = match self.config.eviction_policy {
                    EvictionPolicy::LeastRecentlyUsed => entry.last_accessed_at,
                    EvictionPolicy::OldestFirst => entry.cached_at,
                };
                (key.clone(), rank)
            })
            .collect();
        candidates.sort_by_key(|(_, rank)| *rank);

        for (key, _) in candidates.into_iter().take(batch) {
            tracing::debug!(path = %key.display(), "evicting cache entry for capacity");
            inner.entries.remove(&key);
            inner.evictions += 1;
        }
    }
}

async fn file_mtime(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok().and_then(|meta| meta.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(ttl_ms: u64, max_entries: usize) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_millis(ttl_ms),
            max_entries,
            eviction_policy: EvictionPolicy::LeastRecentlyUsed,
            watch_files: false,
        }
    }

    #[tokio::test]
    async fn hit_within_ttl() {
        let cache = SchemaCache::new(config(60_000, 8));
        let path = Path::new("schemas/a.json");
        cache.set(path, json!({"type": "object"})).await.unwrap();
        assert_eq!(cache.get(path).await, Some(json!({"type": "object"})));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn miss_after_ttl_expiry_and_entry_evicted() {
        let cache = SchemaCache::new(config(10, 8));
        let path = Path::new("schemas/a.json");
        cache.set(path, json!(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get(path).await, None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn normalized_paths_share_one_entry() {
        let cache = SchemaCache::new(config(60_000, 8));
        cache.set(Path::new("schemas/./a.json"), json!(true)).await.unwrap();
        assert_eq!(cache.get(Path::new("schemas/common/../a.json")).await, Some(json!(true)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn size_never_exceeds_max_entries() {
        let cache = SchemaCache::new(config(60_000, 5));
        for i in 0..50 {
            let path = PathBuf::from(format!("schemas/s{i}.json"));
            cache.set(&path, json!(i)).await.unwrap();
            assert!(cache.len() <= 5, "cache grew past capacity at insert {i}");
        }
    }

    #[tokio::test]
    async fn lru_eviction_keeps_recently_accessed_entries() {
        let cache = SchemaCache::new(config(60_000, 3));
        for name in ["a", "b", "c"] {
            let path = PathBuf::from(format!("{name}.json"));
            cache.set(&path, json!(name)).await.unwrap();
        }
        // Touch "a" so "b" is the least recently used.
        assert!(cache.get(Path::new("a.json")).await.is_some());
        cache.set(Path::new("d.json"), json!("d")).await.unwrap();
        assert!(cache.get(Path::new("a.json")).await.is_some());
        assert!(cache.get(Path::new("d.json")).await.is_some());
    }

    #[tokio::test]
    async fn stale_mtime_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "{}").unwrap();
        let cache = SchemaCache::new(config(60_000, 8));
        cache.set(&path, json!({})).await.unwrap();

        // Rewrite with an explicitly different mtime.
        std::fs::write(&path, "{\"changed\": true}").unwrap();
        let bumped = SystemTime::now() + Duration::from_secs(5);
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(bumped).unwrap();
        drop(file);

        assert_eq!(cache.get(&path).await, None);
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let cache = SchemaCache::new(config(60_000, 8));
        cache.set(Path::new("a.json"), json!(1)).await.unwrap();
        cache.set(Path::new("b.json"), json!(2)).await.unwrap();
        assert!(cache.invalidate(Path::new("a.json")));
        assert!(!cache.invalidate(Path::new("a.json")));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn maintenance_sweeps_expired_entries() {
        let cache = SchemaCache::new(config(10, 8));
        cache.set(Path::new("a.json"), json!(1)).await.unwrap();
        cache.set(Path::new("b.json"), json!(2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.perform_maintenance(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn stats_report_hit_rate_and_bytes() {
        let cache = SchemaCache::new(config(60_000, 8));
        cache.set(Path::new("a.json"), json!({"k": "v"})).await.unwrap();
        let _ = cache.get(Path::new("a.json")).await;
        let _ = cache.get(Path::new("missing.json")).await;
        let stats = cache.stats();
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
        assert!(stats.approx_bytes > 0);
    }

    #[tokio::test]
    async fn zero_capacity_cache_stores_nothing() {
        let cache = SchemaCache::new(config(60_000, 0));
        cache.set(Path::new("a.json"), json!(1)).await.unwrap();
        assert!(cache.is_empty());
    }
}
