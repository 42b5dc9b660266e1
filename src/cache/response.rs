//! Coalescing TTL cache for finished interpretations.
//!
//! # Architecture
//!
//! One async mutex guards both the entry table and the in-flight marker
//! map. Holding them under a single lock is the point: the check for an
//! existing entry, the check for a pending generation, and the insertion
//! of a new marker happen in one critical section, so two concurrent
//! requests can never both conclude they are the first for a fingerprint.
//!
//! The pending generation itself runs on a detached task. A caller that
//! disappears mid-generation (client hangup) therefore cannot strand the
//! other waiters, and the marker is cleared on every exit path including
//! a panicking generation. Completion is fanned out to waiters over a
//! single-shot broadcast channel; the entry is stored before the fan-out
//! so a waiter re-asking immediately sees a hit.
//!
//! Expired entries are dropped when observed by a lookup and when an
//! insert needs room; there is no separate sweep for the cache (the
//! limiter owns the only background task in the crate).

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tracing::debug;

use crate::types::Reading;
use crate::{Result, SibylError};

/// Default bound on stored entries.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Process-lifetime cache counters. A snapshot copy, not a live view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Callers served by attaching to an already pending generation.
    pub coalesced_waits: u64,
}

struct CacheEntry {
    payload: Reading,
    created_at: Instant,
    expires_at: Instant,
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, broadcast::Sender<Result<Reading>>>,
}

impl Inner {
    /// Unexpired payload for the fingerprint; expired entries are removed
    /// on observation.
    fn live(&mut self, fingerprint: &str) -> Option<Reading> {
        match self.entries.get(fingerprint) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.payload.clone()),
            Some(_) => {
                self.entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    fn store(&mut self, fingerprint: &str, payload: Reading, ttl: Duration, max_entries: usize) {
        if self.entries.len() >= max_entries && !self.entries.contains_key(fingerprint) {
            let now = Instant::now();
            self.entries.retain(|_, entry| now < entry.expires_at);
        }
        if self.entries.len() >= max_entries && !self.entries.contains_key(fingerprint) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        let now = Instant::now();
        self.entries.insert(
            fingerprint.to_string(),
            CacheEntry {
                payload,
                created_at: now,
                expires_at: now + ttl,
            },
        );
    }
}

/// In-memory interpretation cache with in-flight request coalescing.
pub struct ResponseCache {
    inner: Arc<Mutex<Inner>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced_waits: AtomicU64,
}

impl ResponseCache {
    /// Create a cache bounded to `max_entries` stored readings. Inserting
    /// at capacity first drops expired entries, then the oldest one.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            })),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced_waits: AtomicU64::new(0),
        }
    }

    /// Look up a fingerprint, recording a hit or a miss.
    pub async fn get(&self, fingerprint: &str) -> Option<Reading> {
        let mut inner = self.inner.lock().await;
        match inner.live(fingerprint) {
            Some(reading) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fp_prefix(fingerprint), "cache hit");
                Some(reading)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fp_prefix(fingerprint), "cache miss");
                None
            }
        }
    }

    /// Store a reading under a fingerprint without going through a
    /// generation.
    pub async fn insert(&self, fingerprint: &str, payload: Reading, ttl: Duration) {
        let mut inner = self.inner.lock().await;
        inner.store(fingerprint, payload, ttl, self.max_entries);
    }

    /// Return the cached reading for `fingerprint`, or run `generation`
    /// to produce, store (for `ttl`), and return it.
    ///
    /// At most one generation per fingerprint is ever in flight: callers
    /// arriving while one is pending attach to it and receive its
    /// outcome, success or failure alike. Failed generations are
    /// propagated to every attached caller and nothing is cached.
    pub async fn get_or_compute<Fut>(
        &self,
        fingerprint: &str,
        ttl: Duration,
        generation: impl FnOnce() -> Fut,
    ) -> Result<Reading>
    where
        Fut: Future<Output = Result<Reading>> + Send + 'static,
    {
        let waiter = {
            let mut inner = self.inner.lock().await;
            if let Some(reading) = inner.live(fingerprint) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fp_prefix(fingerprint), "cache hit");
                return Ok(reading);
            }
            match inner.in_flight.get(fingerprint) {
                Some(pending) => {
                    self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        fingerprint = %fp_prefix(fingerprint),
                        "attached to in-flight generation"
                    );
                    Some(pending.subscribe())
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    let (sender, _) = broadcast::channel(1);
                    inner.in_flight.insert(fingerprint.to_string(), sender);
                    None
                }
            }
        };

        match waiter {
            Some(mut receiver) => match receiver.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(SibylError::Stream(
                    "pending generation was abandoned".to_string(),
                )),
            },
            None => self.lead_generation(fingerprint, ttl, generation()).await,
        }
    }

    /// Drive the one generation for this fingerprint on a detached task,
    /// then publish its outcome.
    async fn lead_generation(
        &self,
        fingerprint: &str,
        ttl: Duration,
        generation: impl Future<Output = Result<Reading>> + Send + 'static,
    ) -> Result<Reading> {
        let inner = Arc::clone(&self.inner);
        let fingerprint = fingerprint.to_string();
        let max_entries = self.max_entries;

        let task = tokio::spawn(async move {
            // A panicking generation must still clear the marker.
            let outcome = match AssertUnwindSafe(generation).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(SibylError::Stream("generation panicked".to_string())),
            };

            // Store and clear the marker in one critical section: a new
            // caller always sees either the marker or the fresh entry,
            // never a gap that would admit a duplicate generation.
            let pending = {
                let mut inner = inner.lock().await;
                if let Ok(reading) = &outcome {
                    inner.store(&fingerprint, reading.clone(), ttl, max_entries);
                }
                inner.in_flight.remove(&fingerprint)
            };
            if let Some(pending) = pending {
                let _ = pending.send(outcome.clone());
            }
            outcome
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(SibylError::Stream(format!(
                "generation task failed: {join_error}"
            ))),
        }
    }

    /// Snapshot of the hit/miss/coalesced-wait counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
        }
    }

    /// Zero the counters. Cached entries are untouched; eviction is
    /// [`ResponseCache::clear`], deliberately a separate operation.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.coalesced_waits.store(0, Ordering::Relaxed);
    }

    /// Evict all entries. Counters are untouched.
    pub async fn clear(&self) {
        self.inner.lock().await.entries.clear();
    }

    /// Number of stored entries, expired ones included until observed.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

fn fp_prefix(fingerprint: &str) -> &str {
    &fingerprint[..8.min(fingerprint.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(story: &str) -> Reading {
        Reading::from_narrative(story, true)
    }

    #[tokio::test]
    async fn insert_then_get_is_a_hit() {
        let cache = ResponseCache::default();
        cache
            .insert("abcd1234", reading("The Sun."), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("abcd1234").await.unwrap().story, "The Sun.");
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        tokio::time::pause();
        let cache = ResponseCache::default();
        cache
            .insert("abcd1234", reading("The Moon."), Duration::from_secs(10))
            .await;
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("abcd1234").await.is_none());
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_entry() {
        tokio::time::pause();
        let cache = ResponseCache::new(2);
        let ttl = Duration::from_secs(600);
        cache.insert("first", reading("one"), ttl).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.insert("second", reading("two"), ttl).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.insert("third", reading("three"), ttl).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("first").await.is_none());
        assert!(cache.get("second").await.is_some());
        assert!(cache.get("third").await.is_some());
    }

    #[tokio::test]
    async fn failed_generation_caches_nothing() {
        let cache = ResponseCache::default();
        let outcome = cache
            .get_or_compute("abcd1234", Duration::from_secs(60), || async {
                Err(SibylError::Upstream("connection refused".to_string()))
            })
            .await;
        assert!(matches!(outcome, Err(SibylError::Upstream(_))));
        assert_eq!(cache.len().await, 0);
        assert!(cache.inner.lock().await.in_flight.is_empty());
    }

    #[tokio::test]
    async fn panicking_generation_clears_the_marker() {
        let cache = ResponseCache::default();
        let outcome = cache
            .get_or_compute("abcd1234", Duration::from_secs(60), || async {
                panic!("oracle on fire")
            })
            .await;
        assert!(outcome.is_err());
        assert!(cache.inner.lock().await.in_flight.is_empty());

        // The fingerprint is not stuck: a later attempt computes again.
        let second = cache
            .get_or_compute("abcd1234", Duration::from_secs(60), || async {
                Ok(reading("recovered"))
            })
            .await
            .unwrap();
        assert_eq!(second.story, "recovered");
    }
}
