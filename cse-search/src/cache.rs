//! In-memory TTL + LRU cache for search responses.
//!
//! Entries are keyed by [`QueryFingerprint`] and live for a TTL fixed at
//! insertion. Expired entries are evicted lazily when looked up and
//! periodically by a background sweeper (see [`ResultCache::spawn_sweeper`]).
//! Once the configured capacity is reached the least-recently-used entry is
//! evicted to make room.
//!
//! All state sits behind one [`Mutex`], so an entry is either absent, fully
//! populated, or removed; no caller observes a partial write. Lock hold
//! times are short and never span an `.await`.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;
use crate::normalize::QueryFingerprint;
use crate::types::{SearchKind, SearchResponse};

/// A cached response and its access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    fingerprint: QueryFingerprint,
    kind: SearchKind,
    query: String,
    response: SearchResponse,
    created_at: DateTime<Utc>,
    inserted: Instant,
    // `None` when the TTL reaches past what `Instant` can represent.
    expires: Option<Instant>,
    hit_count: u64,
    last_access: Instant,
    last_access_at: DateTime<Utc>,
}

impl CacheEntry {
    /// The cache key.
    pub fn fingerprint(&self) -> &QueryFingerprint {
        &self.fingerprint
    }

    /// Search kind of the cached response.
    pub fn kind(&self) -> SearchKind {
        self.kind
    }

    /// Canonical query text that produced the response.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The cached response, as it was stored.
    pub fn response(&self) -> &SearchResponse {
        &self.response
    }

    /// Consume the entry, returning the cached response.
    pub fn into_response(self) -> SearchResponse {
        self.response
    }

    /// Wall-clock insertion time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time left before expiry, zero once expired.
    pub fn time_to_live(&self) -> Duration {
        self.expires
            .map_or(Duration::MAX, |expires| expires.saturating_duration_since(Instant::now()))
    }

    /// Time since insertion.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.inserted)
    }

    /// Number of lookups served by this entry.
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// Wall-clock time of the last insertion or hit.
    pub fn last_access_at(&self) -> DateTime<Utc> {
        self.last_access_at
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires.is_some_and(|expires| now >= expires)
    }

    fn summary(&self, now: Instant) -> CacheEntrySummary {
        CacheEntrySummary {
            fingerprint: self.fingerprint.clone(),
            kind: self.kind,
            query: self.query.clone(),
            result_count: self.response.items.len(),
            hit_count: self.hit_count,
            created_at: self.created_at,
            last_access_at: self.last_access_at,
            expired: self.is_expired_at(now),
        }
    }
}

/// Read-only view of an entry for the operational surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntrySummary {
    /// The cache key.
    pub fingerprint: QueryFingerprint,
    /// Search kind.
    pub kind: SearchKind,
    /// Canonical query text.
    pub query: String,
    /// Number of items in the cached response.
    pub result_count: usize,
    /// Lookups served by this entry.
    pub hit_count: u64,
    /// Wall-clock insertion time.
    pub created_at: DateTime<Utc>,
    /// Wall-clock time of the last insertion or hit.
    pub last_access_at: DateTime<Utc>,
    /// Whether the entry is past its TTL and awaiting eviction.
    pub expired: bool,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries currently held, expired or not.
    pub size: usize,
    /// Entries still within their TTL.
    pub valid_entries: usize,
    /// Entries past their TTL that have not been evicted yet.
    pub expired_entries: usize,
    /// Lookups that returned an entry.
    pub hits: u64,
    /// Lookups that found nothing or an expired entry.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 when nothing was looked up.
    pub hit_rate: f64,
    /// Entries removed for capacity or expiry, by lookup or background
    /// sweep. Explicit clears are not counted.
    pub evictions: u64,
    /// Capacity before least-recently-used eviction.
    pub max_entries: usize,
    /// Default TTL in seconds.
    pub ttl_seconds: u64,
}

struct CacheState {
    entries: LruCache<QueryFingerprint, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Process-wide result cache. Construct once and share via [`Arc`].
pub struct ResultCache {
    state: Mutex<CacheState>,
    default_ttl: Duration,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("max_entries", &self.capacity())
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    /// Create a cache holding at most `max_entries` responses (minimum 1).
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            default_ttl,
        }
    }

    /// Create a cache sized from `config`.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.cache_max_entries, config.cache_ttl())
    }

    /// TTL used by [`ResultCache::put_default`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry, recording the hit.
    ///
    /// An expired entry counts as a miss and is evicted on the spot.
    pub fn get(&self, fingerprint: &QueryFingerprint) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        match state.entries.peek(fingerprint).map(|e| e.is_expired_at(now)) {
            None => {
                state.misses += 1;
                tracing::debug!(fingerprint = fingerprint.short(), "cache miss");
                None
            }
            Some(true) => {
                state.entries.pop(fingerprint);
                state.misses += 1;
                state.evictions += 1;
                tracing::debug!(fingerprint = fingerprint.short(), "cache entry expired");
                None
            }
            Some(false) => {
                let entry = state.entries.get_mut(fingerprint)?;
                entry.hit_count += 1;
                entry.last_access = now;
                entry.last_access_at = Utc::now();
                let snapshot = entry.clone();
                state.hits += 1;
                tracing::debug!(
                    fingerprint = fingerprint.short(),
                    hit_count = snapshot.hit_count,
                    "cache hit"
                );
                Some(snapshot)
            }
        }
    }

    /// Store `response` under `fingerprint` for `ttl`.
    ///
    /// Replaces any previous entry for the same fingerprint (last writer
    /// wins) and resets its hit count.
    pub fn put(
        &self,
        fingerprint: QueryFingerprint,
        query: impl Into<String>,
        response: SearchResponse,
        ttl: Duration,
    ) {
        let now = Instant::now();
        let wall = Utc::now();
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            kind: response.kind,
            query: query.into(),
            response,
            created_at: wall,
            inserted: now,
            expires: now.checked_add(ttl),
            hit_count: 0,
            last_access: now,
            last_access_at: wall,
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        if let Some((evicted, _)) = state.entries.push(fingerprint.clone(), entry) {
            if evicted != fingerprint {
                state.evictions += 1;
                tracing::debug!(fingerprint = evicted.short(), "cache evicted lru entry");
            }
        }
        tracing::debug!(
            fingerprint = fingerprint.short(),
            ttl_secs = ttl.as_secs(),
            "cache put"
        );
    }

    /// Store `response` with the default TTL.
    pub fn put_default(
        &self,
        fingerprint: QueryFingerprint,
        query: impl Into<String>,
        response: SearchResponse,
    ) {
        self.put(fingerprint, query, response, self.default_ttl);
    }

    /// Remove one entry. Returns whether it was present.
    pub fn remove(&self, fingerprint: &QueryFingerprint) -> bool {
        self.lock().entries.pop(fingerprint).is_some()
    }

    /// Remove entries, returning how many were removed.
    ///
    /// With `expired_only` set only entries past their TTL go; otherwise
    /// the cache is emptied. Counters, evictions included, are kept.
    pub fn clear(&self, expired_only: bool) -> usize {
        if expired_only {
            let removed = self.remove_expired(false);
            tracing::info!(removed, expired_only, "cache cleared");
            return removed;
        }

        let mut state = self.lock();
        let removed = state.entries.len();
        state.entries.clear();
        tracing::info!(removed, expired_only, "cache cleared");
        removed
    }

    /// Evict every expired entry, as the background sweep does.
    ///
    /// Unlike [`clear`](Self::clear), removed entries count as evictions.
    pub fn purge_expired(&self) -> usize {
        self.remove_expired(true)
    }

    fn remove_expired(&self, count_evictions: bool) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        let now = Instant::now();
        let expired: Vec<QueryFingerprint> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.entries.pop(key);
        }
        if count_evictions {
            state.evictions += expired.len() as u64;
        }
        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "cache removed expired entries");
        }
        expired.len()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let state = self.lock();
        let size = state.entries.len();
        let expired_entries = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .count();
        let lookups = state.hits + state.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            state.hits as f64 / lookups as f64
        };
        CacheStats {
            size,
            valid_entries: size - expired_entries,
            expired_entries,
            hits: state.hits,
            misses: state.misses,
            hit_rate,
            evictions: state.evictions,
            max_entries: state.entries.cap().get(),
            ttl_seconds: self.default_ttl.as_secs(),
        }
    }

    /// Up to `n` entries, most recently accessed first.
    pub fn recent(&self, n: usize) -> Vec<CacheEntrySummary> {
        let now = Instant::now();
        let state = self.lock();
        // LRU order is exactly last-access order: puts and hits both promote.
        state
            .entries
            .iter()
            .take(n)
            .map(|(_, entry)| entry.summary(now))
            .collect()
    }

    /// Up to `n` entries, highest hit count first, ties broken by recency.
    pub fn popular(&self, n: usize) -> Vec<CacheEntrySummary> {
        let now = Instant::now();
        let state = self.lock();
        let mut entries: Vec<&CacheEntry> = state.entries.iter().map(|(_, e)| e).collect();
        entries.sort_by(|a, b| {
            b.hit_count
                .cmp(&a.hit_count)
                .then_with(|| b.last_access.cmp(&a.last_access))
        });
        entries
            .into_iter()
            .take(n)
            .map(|entry| entry.summary(now))
            .collect()
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity before least-recently-used eviction.
    pub fn capacity(&self) -> usize {
        self.lock().entries.cap().get()
    }

    /// Spawn a task that purges expired entries every `interval` until
    /// `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("cache sweeper cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let removed = cache.purge_expired();
                        tracing::debug!(removed, remaining = cache.len(), "cache sweep");
                    }
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Every mutation completes before the guard drops, so a poisoned
        // state is still consistent.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
