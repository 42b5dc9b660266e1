//! Fixed-window rate limiting.
//!
//! [`FixedWindowLimiter`] bounds request rate per client identity: the
//! first request in a window starts it, subsequent requests increment a
//! counter, and the counter is refused once it reaches the limit until
//! the window resets. Exceeding the limit is a reported decision, never
//! an error value.
//!
//! State is a sharded concurrent map so every increment-and-compare runs
//! under per-key mutual exclusion. A background sweep removes expired
//! windows on a fixed cadence, bounding memory to the number of distinct
//! recently-active identities; the sweep removes one entry at a time and
//! is cancelled deterministically by [`FixedWindowLimiter::shutdown`].
//!
//! All state is process-local. Horizontally-scaled deployments limit per
//! instance; that soft-limiting tradeoff is accepted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sentinel identity for callers with no derivable address. The limiter
/// treats it as an ordinary shared identity.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Derive a client identity from addressing headers: the first
/// comma-separated entry of the forwarded-address header when present,
/// else the real-address header, else [`UNKNOWN_IDENTITY`].
pub fn derive_identity(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    if let Some(forwarded) = forwarded_for {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real) = real_ip {
        let real = real.trim();
        if !real.is_empty() {
            return real.to_string();
        }
    }
    UNKNOWN_IDENTITY.to_string()
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// When the current window ends and the count starts over.
    pub resets_at: Instant,
}

impl RateDecision {
    /// Time until the window resets, for `Retry-After` style guidance.
    pub fn retry_after(&self) -> Duration {
        self.resets_at.saturating_duration_since(Instant::now())
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// Per-identity fixed-window request limiter with a cancellable
/// background sweep.
pub struct FixedWindowLimiter {
    windows: Arc<DashMap<String, Window>>,
    admitted: AtomicU64,
    throttled: AtomicU64,
    cancel: CancellationToken,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl FixedWindowLimiter {
    /// Create a limiter and start its sweep on the given cadence.
    /// `sweep_interval` must be non-zero or the sweep task dies at its
    /// first poll.
    ///
    /// # Panics
    ///
    /// Must be called within a tokio runtime context (spawns the sweep
    /// task).
    pub fn new(sweep_interval: Duration) -> Self {
        let windows = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();
        let sweeper = spawn_sweeper(Arc::clone(&windows), sweep_interval, cancel.clone());
        Self {
            windows,
            admitted: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            cancel,
            sweeper: std::sync::Mutex::new(Some(sweeper)),
        }
    }

    /// Check the identity against `limit` requests per `window`, consuming
    /// one slot when admitted.
    ///
    /// A missing or expired window starts fresh with count 1. Within a
    /// live window the count increments until it reaches `limit`; further
    /// requests are refused with `remaining = 0` and the unchanged reset
    /// time.
    pub fn check_and_consume(&self, identity: &str, limit: u32, window: Duration) -> RateDecision {
        let now = Instant::now();
        let decision = match self.windows.entry(identity.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if now >= entry.resets_at {
                    *entry = Window {
                        count: 1,
                        resets_at: now + window,
                    };
                    RateDecision {
                        allowed: true,
                        limit,
                        remaining: limit.saturating_sub(1),
                        resets_at: entry.resets_at,
                    }
                } else if entry.count < limit {
                    entry.count += 1;
                    RateDecision {
                        allowed: true,
                        limit,
                        remaining: limit - entry.count,
                        resets_at: entry.resets_at,
                    }
                } else {
                    RateDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        resets_at: entry.resets_at,
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let resets_at = now + window;
                vacant.insert(Window { count: 1, resets_at });
                RateDecision {
                    allowed: true,
                    limit,
                    remaining: limit.saturating_sub(1),
                    resets_at,
                }
            }
        };

        if decision.allowed {
            self.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.throttled.fetch_add(1, Ordering::Relaxed);
            debug!(identity, limit, "request throttled");
        }
        decision
    }

    /// Total admitted decisions since construction.
    pub fn admitted_total(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Total throttled decisions since construction.
    pub fn throttled_total(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    /// Identities currently holding a window entry.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Stop the background sweep and wait for it to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .sweeper
            .lock()
            .ok()
            .and_then(|mut sweeper| sweeper.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for FixedWindowLimiter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn spawn_sweeper(
    windows: Arc<DashMap<String, Window>>,
    sweep_interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => sweep(&windows),
            }
        }
    })
}

/// Remove expired windows one entry at a time, re-checking expiry under
/// the entry lock so a window restarted between scan and removal
/// survives. Request handling is never blocked for more than a single
/// removal.
fn sweep(windows: &DashMap<String, Window>) {
    let now = Instant::now();
    let expired: Vec<String> = windows
        .iter()
        .filter(|entry| now >= entry.value().resets_at)
        .map(|entry| entry.key().clone())
        .collect();

    let mut removed = 0usize;
    for key in expired {
        if windows
            .remove_if(&key, |_, window| now >= window.resets_at)
            .is_some()
        {
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(removed, "sweep dropped expired rate limit windows");
    }
}
