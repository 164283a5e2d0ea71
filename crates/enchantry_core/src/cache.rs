//! # Two-Tier Cache
//!
//! Memoizes compatibility answers in front of the engine.
//!
//! ```text
//!   get(k) ──► HOT (small, short TTL) ── hit ──► value
//!                 │ miss
//!                 ▼
//!              COLD (large, long TTL) ── hit ──► promote to HOT ──► value
//!                 │ miss
//!                 ▼
//!               None
//!
//!   put(k) ──► COLD (evict LRU if full)
//!          └─► HOT  (only if it has room or already holds k)
//! ```
//!
//! The cache holds no authoritative state. Dropping every entry only costs
//! recomputation; an entry never outlives its TTL as a visible answer.
//!
//! ## Concurrency
//!
//! Tiers are `DashMap`s. A hit refreshes the entry's access stamp through an
//! atomic under a shard *read* guard, so concurrent readers of unrelated
//! keys never serialize. Capacity is checked before insert; racing inserts
//! may overshoot by a few entries until the next eviction.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{CacheConfig, TierConfig};
use crate::error::{EngineError, EngineResult};
use crate::maintenance::Sweep;

/// Which tier an explicit insert targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheTier {
    /// Small, short-lived tier.
    Hot,
    /// Large, long-lived tier.
    Cold,
}

/// Point-in-time cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStats {
    /// Entries currently in the hot tier.
    pub hot_size: usize,
    /// Entries currently in the cold tier.
    pub cold_size: usize,
    /// Lookups answered by the hot tier.
    pub hot_hits: u64,
    /// Lookups answered by the cold tier.
    pub cold_hits: u64,
    /// Lookups answered by neither tier.
    pub misses: u64,
    /// `(hot_hits + cold_hits) / lookups`, 0 before the first lookup.
    pub hit_rate: f64,
}

impl CacheStats {
    /// Sums two snapshots, recomputing the hit rate.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let hot_hits = self.hot_hits + other.hot_hits;
        let cold_hits = self.cold_hits + other.cold_hits;
        let misses = self.misses + other.misses;
        Self {
            hot_size: self.hot_size + other.hot_size,
            cold_size: self.cold_size + other.cold_size,
            hot_hits,
            cold_hits,
            misses,
            hit_rate: hit_rate(hot_hits + cold_hits, misses),
        }
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
    /// Cache generation the value was computed under.
    generation: u64,
    /// Access sequence number; lowest is least recently used.
    last_access: AtomicU64,
}

impl<V> Entry<V> {
    /// Unexpired and written in the current generation.
    #[inline]
    fn is_live(&self, now: Instant, generation: u64) -> bool {
        now < self.expires_at && self.generation == generation
    }
}

struct Tier<K, V> {
    map: DashMap<K, Entry<V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> Tier<K, V> {
    fn new(config: &TierConfig) -> Self {
        Self {
            map: DashMap::with_capacity(config.capacity),
            capacity: config.capacity,
            ttl: config.ttl(),
        }
    }

    /// Live value for `key`, refreshing its access stamp. Dead entries
    /// are dropped on the way.
    fn lookup(&self, key: &K, now: Instant, stamp: u64, generation: u64) -> Option<V> {
        let dead = match self.map.get(key) {
            Some(entry) if entry.is_live(now, generation) => {
                entry.last_access.store(stamp, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if dead {
            self.map.remove_if(key, |_, e| !e.is_live(now, generation));
        }
        None
    }

    fn has_room_for(&self, key: &K) -> bool {
        self.map.len() < self.capacity || self.map.contains_key(key)
    }

    fn insert(&self, key: K, value: V, now: Instant, stamp: u64, generation: u64) {
        if !self.has_room_for(&key) {
            self.evict_lru();
        }
        self.map.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
                generation,
                last_access: AtomicU64::new(stamp),
            },
        );
    }

    fn evict_lru(&self) {
        let victim = self
            .map
            .iter()
            .min_by_key(|e| e.value().last_access.load(Ordering::Relaxed))
            .map(|e| e.key().clone());
        if let Some(key) = victim {
            self.map.remove(&key);
        }
    }

    fn contains_live(&self, key: &K, now: Instant, generation: u64) -> bool {
        self.map.get(key).is_some_and(|e| e.is_live(now, generation))
    }

    fn sweep(&self, now: Instant, generation: u64) -> usize {
        let mut removed = 0;
        self.map.retain(|_, e| {
            let keep = e.is_live(now, generation);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

/// Hot/cold memoization tiers with TTL expiry and LRU eviction.
pub struct TwoTierCache<K, V> {
    hot: Tier<K, V>,
    cold: Tier<K, V>,
    clock: AtomicU64,
    generation: AtomicU64,
    hot_hits: AtomicU64,
    cold_hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> std::fmt::Debug for TwoTierCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTierCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<K, V> TwoTierCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty cache.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero capacity or TTL in either tier.
    pub fn new(config: &CacheConfig) -> EngineResult<Self> {
        for (name, tier) in [("hot", &config.hot), ("cold", &config.cold)] {
            if tier.capacity == 0 || tier.ttl_ms == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "cache.{name} needs a positive capacity and ttl_ms"
                )));
            }
        }
        Ok(Self {
            hot: Tier::new(&config.hot),
            cold: Tier::new(&config.cold),
            clock: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            hot_hits: AtomicU64::new(0),
            cold_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    #[inline]
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of [`Self::clear`] calls so far.
    ///
    /// Entries carry the generation they were written under and only the
    /// current one is served. Read it before computing a value and hand it
    /// to [`Self::put_if_current`] so an answer computed before a clear is
    /// never served after it.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Looks `key` up, hot tier first. A cold hit promotes a fresh copy.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let generation = self.generation();

        if let Some(value) = self.hot.lookup(key, now, self.tick(), generation) {
            self.hot_hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        if let Some(value) = self.cold.lookup(key, now, self.tick(), generation) {
            self.cold_hits.fetch_add(1, Ordering::Relaxed);
            self.hot
                .insert(key.clone(), value.clone(), now, self.tick(), generation);
            return Some(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Inserts into the cold tier, and into the hot tier while it has room
    /// or already holds `key`.
    pub fn put(&self, key: K, value: V) {
        self.insert_both(key, value, self.generation());
    }

    fn insert_both(&self, key: K, value: V, generation: u64) {
        let now = Instant::now();
        if self.hot.has_room_for(&key) {
            self.hot
                .insert(key.clone(), value.clone(), now, self.tick(), generation);
        }
        self.cold.insert(key, value, now, self.tick(), generation);
    }

    /// [`Self::put`] stamped with `generation`. Skipped, returning
    /// `false`, when the cache was cleared since `generation` was read. A
    /// clear racing the write leaves an entry that is never served.
    pub fn put_if_current(&self, key: K, value: V, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.insert_both(key, value, generation);
        true
    }

    /// Inserts into one tier only.
    pub fn put_in(&self, key: K, value: V, tier: CacheTier) {
        let now = Instant::now();
        let target = match tier {
            CacheTier::Hot => &self.hot,
            CacheTier::Cold => &self.cold,
        };
        target.insert(key, value, now, self.tick(), self.generation());
    }

    /// Cached value, or the result of `compute` which is then cached.
    /// Errors are returned and nothing is inserted.
    ///
    /// Concurrent misses on one key may each compute.
    ///
    /// # Errors
    ///
    /// Whatever `compute` returns.
    pub fn get_or_try_compute<E, F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let generation = self.generation();
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.put_if_current(key, value.clone(), generation);
        Ok(value)
    }

    /// Infallible [`Self::get_or_try_compute`].
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        let generation = self.generation();
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.put_if_current(key, value.clone(), generation);
        value
    }

    /// Whether either tier holds a live entry. Does not touch counters.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        let now = Instant::now();
        let generation = self.generation();
        self.hot.contains_live(key, now, generation) || self.cold.contains_live(key, now, generation)
    }

    /// Drops `key` from both tiers.
    pub fn remove(&self, key: &K) -> Option<V> {
        let hot = self.hot.map.remove(key).map(|(_, e)| e.value);
        let cold = self.cold.map.remove(key).map(|(_, e)| e.value);
        hot.or(cold)
    }

    /// Distinct keys across both tiers, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        let hot_only = self
            .hot
            .map
            .iter()
            .filter(|e| !self.cold.map.contains_key(e.key()))
            .count();
        self.cold.map.len() + hot_only
    }

    /// Whether both tiers are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hot.map.is_empty() && self.cold.map.is_empty()
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let generation = self.generation();
        let removed = self.hot.sweep(now, generation) + self.cold.sweep(now, generation);
        if removed > 0 {
            debug!(removed, "expired cache entries swept");
        }
        removed
    }

    /// Empties both tiers, resets the counters and starts a new
    /// generation.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.hot.map.clear();
        self.cold.map.clear();
        self.hot_hits.store(0, Ordering::Relaxed);
        self.cold_hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Snapshot of sizes and counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hot_hits = self.hot_hits.load(Ordering::Relaxed);
        let cold_hits = self.cold_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            hot_size: self.hot.map.len(),
            cold_size: self.cold.map.len(),
            hot_hits,
            cold_hits,
            misses,
            hit_rate: hit_rate(hot_hits + cold_hits, misses),
        }
    }
}

impl<K, V> Sweep for TwoTierCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn sweep(&self) -> usize {
        self.cleanup()
    }

    fn stats(&self) -> CacheStats {
        TwoTierCache::stats(self)
    }
}
