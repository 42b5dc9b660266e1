//! Metrics exposition.
//!
//! [`MetricsExporter`] renders the crate's counters in the plain-text
//! `# HELP` / `# TYPE` / sample exposition format scrapers expect. It is
//! constructed with handles to the components it reads — nothing here
//! registers into ambient global state, so tests hold isolated
//! instances.
//!
//! Counters owned by the orchestrator itself (per-outcome totals and the
//! running skipped-frame count) live in [`ServiceMetrics`]; cache and
//! limiter counters are read through their own snapshot methods.

use std::fmt::Display;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::cache::ResponseCache;
use crate::limiter::FixedWindowLimiter;
use crate::telemetry;

/// Final outcome class of one interpretation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingOutcome {
    /// Full narrative delivered.
    Ok,
    /// Deadline-truncated narrative delivered.
    Partial,
    /// The caller got an error.
    Error,
}

impl ReadingOutcome {
    pub fn label(self) -> &'static str {
        match self {
            ReadingOutcome::Ok => "ok",
            ReadingOutcome::Partial => "partial",
            ReadingOutcome::Error => "error",
        }
    }
}

/// Orchestrator-owned counters.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    readings_ok: AtomicU64,
    readings_partial: AtomicU64,
    readings_error: AtomicU64,
    frames_skipped: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_reading(&self, outcome: ReadingOutcome) {
        let counter = match outcome {
            ReadingOutcome::Ok => &self.readings_ok,
            ReadingOutcome::Partial => &self.readings_partial,
            ReadingOutcome::Error => &self.readings_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames_skipped(&self, count: u64) {
        if count > 0 {
            self.frames_skipped.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn readings(&self, outcome: ReadingOutcome) -> u64 {
        match outcome {
            ReadingOutcome::Ok => self.readings_ok.load(Ordering::Relaxed),
            ReadingOutcome::Partial => self.readings_partial.load(Ordering::Relaxed),
            ReadingOutcome::Error => self.readings_error.load(Ordering::Relaxed),
        }
    }

    pub fn frames_skipped_total(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }
}

/// Renders all tracked metrics as one exposition document.
pub struct MetricsExporter {
    cache: Arc<ResponseCache>,
    limiter: Arc<FixedWindowLimiter>,
    service: Arc<ServiceMetrics>,
    started_at: Instant,
}

impl MetricsExporter {
    pub fn new(
        cache: Arc<ResponseCache>,
        limiter: Arc<FixedWindowLimiter>,
        service: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            cache,
            limiter,
            service,
            started_at: Instant::now(),
        }
    }

    /// Render the exposition text. Each metric emits a `# HELP` line, a
    /// `# TYPE` line, and its samples; metrics without labels carry no
    /// brace section at all. A process-uptime gauge and a
    /// collection-timestamp counter are always appended.
    pub fn export(&self) -> String {
        let mut out = String::new();
        let stats = self.cache.stats();

        header(
            &mut out,
            telemetry::CACHE_HITS_TOTAL,
            telemetry::CACHE_HITS_HELP,
            "counter",
        );
        sample(&mut out, telemetry::CACHE_HITS_TOTAL, stats.hits);

        header(
            &mut out,
            telemetry::CACHE_MISSES_TOTAL,
            telemetry::CACHE_MISSES_HELP,
            "counter",
        );
        sample(&mut out, telemetry::CACHE_MISSES_TOTAL, stats.misses);

        header(
            &mut out,
            telemetry::COALESCED_WAITS_TOTAL,
            telemetry::COALESCED_WAITS_HELP,
            "counter",
        );
        sample(
            &mut out,
            telemetry::COALESCED_WAITS_TOTAL,
            stats.coalesced_waits,
        );

        header(
            &mut out,
            telemetry::LIMITER_ADMITTED_TOTAL,
            telemetry::LIMITER_ADMITTED_HELP,
            "counter",
        );
        sample(
            &mut out,
            telemetry::LIMITER_ADMITTED_TOTAL,
            self.limiter.admitted_total(),
        );

        header(
            &mut out,
            telemetry::LIMITER_THROTTLED_TOTAL,
            telemetry::LIMITER_THROTTLED_HELP,
            "counter",
        );
        sample(
            &mut out,
            telemetry::LIMITER_THROTTLED_TOTAL,
            self.limiter.throttled_total(),
        );

        header(
            &mut out,
            telemetry::LIMITER_IDENTITIES,
            telemetry::LIMITER_IDENTITIES_HELP,
            "gauge",
        );
        sample(
            &mut out,
            telemetry::LIMITER_IDENTITIES,
            self.limiter.tracked_identities(),
        );

        header(
            &mut out,
            telemetry::READINGS_TOTAL,
            telemetry::READINGS_HELP,
            "counter",
        );
        for outcome in [
            ReadingOutcome::Ok,
            ReadingOutcome::Partial,
            ReadingOutcome::Error,
        ] {
            labelled_sample(
                &mut out,
                telemetry::READINGS_TOTAL,
                "outcome",
                outcome.label(),
                self.service.readings(outcome),
            );
        }

        header(
            &mut out,
            telemetry::FRAMES_SKIPPED_TOTAL,
            telemetry::FRAMES_SKIPPED_HELP,
            "counter",
        );
        sample(
            &mut out,
            telemetry::FRAMES_SKIPPED_TOTAL,
            self.service.frames_skipped_total(),
        );

        header(
            &mut out,
            telemetry::UPTIME_SECONDS,
            telemetry::UPTIME_HELP,
            "gauge",
        );
        sample(
            &mut out,
            telemetry::UPTIME_SECONDS,
            self.started_at.elapsed().as_secs(),
        );

        header(
            &mut out,
            telemetry::COLLECTION_TIMESTAMP,
            telemetry::COLLECTION_TIMESTAMP_HELP,
            "counter",
        );
        sample(
            &mut out,
            telemetry::COLLECTION_TIMESTAMP,
            chrono::Utc::now().timestamp(),
        );

        out
    }
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn sample(out: &mut String, name: &str, value: impl Display) {
    let _ = writeln!(out, "{name} {value}");
}

fn labelled_sample(out: &mut String, name: &str, key: &str, label: &str, value: impl Display) {
    let _ = writeln!(out, "{name}{{{key}=\"{label}\"}} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn export_renders_help_type_and_samples() {
        let cache = Arc::new(ResponseCache::default());
        let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(60)));
        let service = Arc::new(ServiceMetrics::new());

        limiter.check_and_consume("203.0.113.7", 1, Duration::from_secs(60));
        limiter.check_and_consume("203.0.113.7", 1, Duration::from_secs(60));
        service.record_reading(ReadingOutcome::Ok);
        service.record_frames_skipped(3);

        let exporter = MetricsExporter::new(Arc::clone(&cache), Arc::clone(&limiter), service);
        let text = exporter.export();

        assert!(text.contains("# HELP sibyl_cache_hits_total"));
        assert!(text.contains("# TYPE sibyl_cache_hits_total counter"));
        assert!(text.contains("\nsibyl_cache_hits_total 0\n"));
        assert!(text.contains("sibyl_limiter_admitted_total 1"));
        assert!(text.contains("sibyl_limiter_throttled_total 1"));
        assert!(text.contains("# TYPE sibyl_limiter_identities gauge"));
        assert!(text.contains("sibyl_readings_total{outcome=\"ok\"} 1"));
        assert!(text.contains("sibyl_readings_total{outcome=\"partial\"} 0"));
        assert!(text.contains("sibyl_stream_frames_skipped_total 3"));
        assert!(text.contains("# TYPE sibyl_uptime_seconds gauge"));
        assert!(text.contains("# TYPE sibyl_collection_timestamp_seconds counter"));

        // Unlabelled metrics never render an empty brace pair.
        assert!(!text.contains("{}"));

        limiter.shutdown().await;
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(ReadingOutcome::Ok.label(), "ok");
        assert_eq!(ReadingOutcome::Partial.label(), "partial");
        assert_eq!(ReadingOutcome::Error.label(), "error");
    }
}
