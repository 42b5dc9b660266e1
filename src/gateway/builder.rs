//! Builder for configuring oracle instances.

use std::sync::Arc;
use std::time::Duration;

use super::Oracle;
use crate::cache::{self, ResponseCache};
use crate::limiter::FixedWindowLimiter;
use crate::metrics::ServiceMetrics;
use crate::providers::{CompletionsClient, NarrativeProvider};
use crate::{Result, SibylError};

const DEFAULT_RATE_LIMIT: u32 = 10;
const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Main entry point for creating oracle instances.
pub struct Sibyl;

impl Sibyl {
    /// Create a new builder for configuring the orchestrator.
    pub fn builder() -> SibylBuilder {
        SibylBuilder::new()
    }
}

/// Builder for configuring oracle instances.
pub struct SibylBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    provider: Option<Arc<dyn NarrativeProvider>>,
    rate_limit: u32,
    rate_window: Duration,
    sweep_interval: Duration,
    cache_ttl: Duration,
    cache_max_entries: usize,
}

impl SibylBuilder {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: None,
            provider: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: DEFAULT_RATE_WINDOW,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_max_entries: cache::DEFAULT_MAX_ENTRIES,
        }
    }

    /// Configure the completions provider with an API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the completions endpoint base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Override the completions model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Use a custom narrative provider instead of the completions client.
    /// Takes precedence over [`SibylBuilder::api_key`].
    pub fn provider(mut self, provider: Arc<dyn NarrativeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Admit at most `limit` requests per identity within each `window`.
    pub fn rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = limit;
        self.rate_window = window;
        self
    }

    /// Cadence of the background sweep that drops expired rate windows.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// How long a finished reading is served from cache.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Bound on stored cache entries.
    pub fn cache_max_entries(mut self, max_entries: usize) -> Self {
        self.cache_max_entries = max_entries;
        self
    }

    /// Build the oracle.
    ///
    /// Requires either an API key or a custom provider, and must be
    /// called within a tokio runtime (the limiter starts its sweep task
    /// here).
    pub fn build(self) -> Result<Oracle> {
        if self.rate_limit == 0 {
            return Err(SibylError::Configuration(
                "rate limit must admit at least one request per window".to_string(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(SibylError::Configuration(
                "cache must hold at least one entry".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(SibylError::Configuration(
                "sweep interval must be non-zero".to_string(),
            ));
        }

        let provider: Arc<dyn NarrativeProvider> = match (self.provider, self.api_key) {
            (Some(provider), _) => provider,
            (None, Some(key)) => {
                let client = match self.base_url {
                    Some(url) => CompletionsClient::with_base_url(key, url),
                    None => CompletionsClient::new(key),
                };
                let client = match self.model {
                    Some(model) => client.model(model),
                    None => client,
                };
                Arc::new(client)
            }
            (None, None) => return Err(SibylError::NoProvider),
        };

        let limiter = Arc::new(FixedWindowLimiter::new(self.sweep_interval));
        let cache = Arc::new(ResponseCache::new(self.cache_max_entries));
        let metrics = Arc::new(ServiceMetrics::new());

        Ok(Oracle::new(
            provider,
            limiter,
            cache,
            metrics,
            self.rate_limit,
            self.rate_window,
            self.cache_ttl,
        ))
    }
}

impl Default for SibylBuilder {
    fn default() -> Self {
        Self::new()
    }
}
