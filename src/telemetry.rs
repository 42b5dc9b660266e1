//! Telemetry metric name constants.
//!
//! Centralised names and help strings for everything the
//! [`MetricsExporter`](crate::metrics::MetricsExporter) renders. Keeping
//! them here means the exposition text and any dashboards built on it
//! share one source of truth.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `sibyl_`. Counters end in `_total`,
//! gauges use meaningful units (e.g. `_seconds`).

/// Total reading-cache hits.
pub const CACHE_HITS_TOTAL: &str = "sibyl_cache_hits_total";
pub const CACHE_HITS_HELP: &str = "Interpretations served from the response cache.";

/// Total reading-cache misses.
pub const CACHE_MISSES_TOTAL: &str = "sibyl_cache_misses_total";
pub const CACHE_MISSES_HELP: &str = "Interpretation requests that required an upstream generation.";

/// Total callers attached to an already in-flight generation.
pub const COALESCED_WAITS_TOTAL: &str = "sibyl_coalesced_waits_total";
pub const COALESCED_WAITS_HELP: &str =
    "Concurrent duplicate requests served by one pending generation.";

/// Total requests admitted by the rate limiter.
pub const LIMITER_ADMITTED_TOTAL: &str = "sibyl_limiter_admitted_total";
pub const LIMITER_ADMITTED_HELP: &str = "Requests admitted within their identity's window.";

/// Total requests refused by the rate limiter.
pub const LIMITER_THROTTLED_TOTAL: &str = "sibyl_limiter_throttled_total";
pub const LIMITER_THROTTLED_HELP: &str = "Requests refused because the window was exhausted.";

/// Identities currently tracked by the limiter (gauge).
pub const LIMITER_IDENTITIES: &str = "sibyl_limiter_identities";
pub const LIMITER_IDENTITIES_HELP: &str = "Distinct client identities with a live window entry.";

/// Completed interpretations by outcome.
///
/// Labels: `outcome` ("ok" | "partial" | "error").
pub const READINGS_TOTAL: &str = "sibyl_readings_total";
pub const READINGS_HELP: &str = "Interpretation requests by final outcome.";

/// Total malformed stream frames skipped during consumption.
pub const FRAMES_SKIPPED_TOTAL: &str = "sibyl_stream_frames_skipped_total";
pub const FRAMES_SKIPPED_HELP: &str = "Stream frames dropped because their payload failed to parse.";

/// Process uptime gauge, appended to every export.
pub const UPTIME_SECONDS: &str = "sibyl_uptime_seconds";
pub const UPTIME_HELP: &str = "Seconds since the exporter was constructed.";

/// Collection timestamp counter, appended to every export.
pub const COLLECTION_TIMESTAMP: &str = "sibyl_collection_timestamp_seconds";
pub const COLLECTION_TIMESTAMP_HELP: &str = "Unix time at which this exposition was rendered.";
