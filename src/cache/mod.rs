//! Caching subsystem.
//!
//! [`ResponseCache`] deduplicates interpretation requests two ways:
//!
//! - **TTL entries** — a finished [`Reading`](crate::types::Reading) is
//!   stored under its request fingerprint and served to later identical
//!   requests until it expires.
//!
//! - **In-flight coalescing** — while a generation for a fingerprint is
//!   pending, further callers for the same fingerprint attach to it and
//!   receive its outcome instead of starting a second upstream call.
//!   Duplicate generations are the expensive failure mode here: they pay
//!   twice and burn the provider's own rate limit.
//!
//! Hit, miss, and coalesced-wait counters are snapshot-able through
//! [`ResponseCache::stats`] and resettable without touching cached
//! entries.

pub mod response;

pub use response::{CacheStats, DEFAULT_MAX_ENTRIES, ResponseCache};
