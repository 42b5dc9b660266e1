//! The oracle: one entry point per interpretation request.
//!
//! [`Oracle::interpret`] runs the full admission pipeline: validate the
//! request, charge the caller's rate window, fingerprint the request, and
//! hand generation to the coalescing cache so identical concurrent
//! requests share a single upstream stream. Provider and stream failures
//! are folded into [`SibylError::Upstream`] at this boundary; callers see
//! validation, rate, and upstream errors only.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cache::{CacheStats, ResponseCache};
use crate::limiter::FixedWindowLimiter;
use crate::metrics::{MetricsExporter, ReadingOutcome, ServiceMetrics};
use crate::providers::NarrativeProvider;
use crate::stream;
use crate::types::{Reading, ReadingRequest, StreamBudget};
use crate::{Result, SibylError};

/// Orchestrates validation, rate limiting, caching, and streaming for
/// interpretation requests. Built by [`Sibyl::builder`](super::Sibyl::builder).
pub struct Oracle {
    provider: Arc<dyn NarrativeProvider>,
    limiter: Arc<FixedWindowLimiter>,
    cache: Arc<ResponseCache>,
    metrics: Arc<ServiceMetrics>,
    exporter: MetricsExporter,
    rate_limit: u32,
    rate_window: Duration,
    cache_ttl: Duration,
}

impl Oracle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        provider: Arc<dyn NarrativeProvider>,
        limiter: Arc<FixedWindowLimiter>,
        cache: Arc<ResponseCache>,
        metrics: Arc<ServiceMetrics>,
        rate_limit: u32,
        rate_window: Duration,
        cache_ttl: Duration,
    ) -> Self {
        let exporter = MetricsExporter::new(
            Arc::clone(&cache),
            Arc::clone(&limiter),
            Arc::clone(&metrics),
        );
        Self {
            provider,
            limiter,
            cache,
            metrics,
            exporter,
            rate_limit,
            rate_window,
            cache_ttl,
        }
    }

    /// Run one interpretation request for `identity` end to end.
    ///
    /// A request with no cards is refused with
    /// [`SibylError::Validation`] before anything is charged. A caller
    /// over its rate window gets [`SibylError::RateLimited`] carrying the
    /// time until the window resets. Admitted requests are served from
    /// cache when possible; identical concurrent requests share a single
    /// upstream generation. A narrative truncated at its deadline is a
    /// success with [`Reading::complete`] set to `false`.
    pub async fn interpret(&self, identity: &str, request: &ReadingRequest) -> Result<Reading> {
        request.validate()?;

        let decision = self
            .limiter
            .check_and_consume(identity, self.rate_limit, self.rate_window);
        if !decision.allowed {
            return Err(SibylError::RateLimited {
                retry_after: decision.retry_after(),
                limit: decision.limit,
            });
        }

        let fingerprint = request.fingerprint();
        debug!(
            identity,
            fingerprint = %&fingerprint[..8],
            cards = request.cards.len(),
            "interpretation admitted"
        );

        let budget = StreamBudget::for_cards(request.cards.len());
        let provider = Arc::clone(&self.provider);
        let metrics = Arc::clone(&self.metrics);
        let request = request.clone();

        let outcome = self
            .cache
            .get_or_compute(&fingerprint, self.cache_ttl, move || {
                generate(provider, metrics, request, budget)
            })
            .await;

        match &outcome {
            Ok(reading) if reading.complete => self.metrics.record_reading(ReadingOutcome::Ok),
            Ok(_) => self.metrics.record_reading(ReadingOutcome::Partial),
            Err(_) => self.metrics.record_reading(ReadingOutcome::Error),
        }
        outcome
    }

    /// Snapshot of the cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Zero the cache counters without evicting entries.
    pub fn reset_cache_stats(&self) {
        self.cache.reset_stats();
    }

    /// Render the metrics exposition document.
    pub fn export_metrics(&self) -> String {
        self.exporter.export()
    }

    /// Stop background work. Idempotent. Generations already in flight
    /// run to completion on their own tasks.
    pub async fn shutdown(&self) {
        self.limiter.shutdown().await;
        info!("oracle shut down");
    }
}

/// Open the upstream stream, consume it under the budget, and assemble
/// the reading. Runs detached inside the cache so a hung-up caller never
/// strands coalesced waiters.
async fn generate(
    provider: Arc<dyn NarrativeProvider>,
    metrics: Arc<ServiceMetrics>,
    request: ReadingRequest,
    budget: StreamBudget,
) -> Result<Reading> {
    let chunks = provider
        .open_stream(&request, budget)
        .await
        .map_err(|error| {
            error!(provider = provider.name(), %error, "upstream stream could not be opened");
            fold_upstream(error)
        })?;

    let outcome = stream::consume(chunks, budget).await.map_err(|error| {
        error!(provider = provider.name(), %error, "upstream stream failed");
        fold_upstream(error)
    })?;

    metrics.record_frames_skipped(outcome.frames_skipped);
    if outcome.frames_skipped > 0 {
        warn!(
            skipped = outcome.frames_skipped,
            "skipped malformed stream frames"
        );
    }
    if !outcome.complete {
        warn!(
            chars = outcome.text.len(),
            "narrative truncated at deadline"
        );
    }

    Ok(Reading::from_narrative(&outcome.text, outcome.complete))
}

/// Collapse provider-level failures into the one upstream error callers
/// are promised.
fn fold_upstream(error: SibylError) -> SibylError {
    match error {
        SibylError::Upstream(_) => error,
        other => SibylError::Upstream(other.to_string()),
    }
}
