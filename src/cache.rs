//! In-process TTL cache for meal lists and derived statistics.
//!
//! Keys are structured (namespace, owner, params) and owner invalidation
//! compares the owner field exactly, so one user's id can never knock out
//! another user's entries.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Reference lifetime for every cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Query shape a cached value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    MealList,
    RangeStats,
    DailyStats,
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MealList => write!(f, "meals"),
            Self::RangeStats => write!(f, "stats:range"),
            Self::DailyStats => write!(f, "stats:daily"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: CacheNamespace,
    pub owner_id: Uuid,
    /// Query parameters, e.g. `offset:limit` or `start:end`.
    pub params: String,
}

impl CacheKey {
    pub fn new(namespace: CacheNamespace, owner_id: Uuid, params: impl Into<String>) -> Self {
        Self {
            namespace,
            owner_id,
            params: params.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.owner_id, self.params)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Key-value cache with one fixed TTL for all entries.
///
/// Expired entries read as misses and are dropped lazily on access. There
/// is no size bound; entries leave through expiry, owner invalidation or
/// [`TtlCache::clear`].
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a fresh value, or `None` if missing or expired. Reading never
    /// extends an entry's lifetime.
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_fresh(self.ttl) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        // a concurrent set may have refreshed it between the two locks
        if let Some(entry) = entries.get(key) {
            if entry.is_fresh(self.ttl) {
                return Some(entry.value.clone());
            }
            entries.remove(key);
            debug!(key = %key, "evicted expired cache entry");
        }
        None
    }

    pub async fn set(&self, key: CacheKey, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Drops every entry owned by `owner_id`, across all namespaces.
    /// Returns how many entries were removed.
    pub async fn invalidate_owner(&self, owner_id: Uuid) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| key.owner_id != owner_id);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of entries that are still fresh.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| e.is_fresh(self.ttl)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn owner_entry_count(&self, owner_id: Uuid) -> usize {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(key, entry)| key.owner_id == owner_id && entry.is_fresh(self.ttl))
            .count()
    }
}
