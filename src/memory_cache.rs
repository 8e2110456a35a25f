use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::{Cache, CachedRules, RuleSetKey};
use crate::config::CacheConfig;
use crate::types::RoleId;

/// In-memory cache for applicable rule sets.
///
/// An LRU cache with optional TTL. Lookups only take the read lock; recency
/// is tracked with an atomic tick per entry so concurrent checks for
/// different principals never serialize on each other.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<CacheState>,
    capacity: usize,
    ttl: Option<Duration>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: RwLock<HashMap<RuleSetKey, CacheEntry>>,
    clock: AtomicU64,
}

#[derive(Debug)]
struct CacheEntry {
    rules: CachedRules,
    updated_at: Instant,
    last_used: AtomicU64,
}

impl MemoryCache {
    /// Creates a new cache with the given capacity.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(CacheState::default()),
            capacity,
            ttl: None,
        }
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = Self::new(config.capacity);
        match config.ttl() {
            Some(ttl) => cache.with_ttl(ttl),
            None => cache,
        }
    }

    /// Configures a time-to-live for cache entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Number of live and expired entries currently held.
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tick(&self) -> u64 {
        self.inner.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn is_expired(entry: &CacheEntry, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(entry.updated_at) > ttl
    }

    fn evict_if_needed(entries: &mut HashMap<RuleSetKey, CacheEntry>, capacity: usize) {
        while entries.len() > capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_rules(&self, key: &RuleSetKey) -> Option<CachedRules> {
        if self.capacity == 0 {
            return None;
        }

        let guard = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = guard.get(key)?;
        if let Some(ttl) = self.ttl
            && Self::is_expired(entry, ttl, Instant::now())
        {
            return None;
        }
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.rules.clone())
    }

    async fn set_rules(&self, key: &RuleSetKey, rules: CachedRules) {
        if self.capacity == 0 {
            return;
        }

        let now = Instant::now();
        let entry = CacheEntry {
            rules,
            updated_at: now,
            last_used: AtomicU64::new(self.tick()),
        };
        let mut guard = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(ttl) = self.ttl {
            guard.retain(|_, entry| !Self::is_expired(entry, ttl, now));
        }

        guard.insert(key.clone(), entry);
        Self::evict_if_needed(&mut guard, self.capacity);
    }

    async fn invalidate_role(&self, role: Option<&RoleId>) {
        let mut guard = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.retain(|key, _| !key.depends_on(role));
    }

    async fn invalidate_all(&self) {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
