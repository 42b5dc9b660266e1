//! Sibyl - Interpretation request orchestration for card reading services
//!
//! This crate sits between an HTTP surface and a streaming narrative
//! provider. It validates interpretation requests, rate-limits them per
//! client identity, deduplicates identical work through a coalescing TTL
//! cache, reassembles the provider's event stream under a per-request
//! budget, and exposes its counters as plain-text metrics.
//!
//! # Example
//!
//! ```rust,no_run
//! use sibyl::{DrawnCard, ReadingRequest, Sibyl};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> sibyl::Result<()> {
//!     let oracle = Sibyl::builder()
//!         .api_key("sk-your-key")
//!         .rate_limit(10, Duration::from_secs(60))
//!         .build()?;
//!
//!     let request = ReadingRequest::new(
//!         "celtic-cross",
//!         3,
//!         "en",
//!         vec![
//!             DrawnCard::new("the-sun", "The Sun", 0),
//!             DrawnCard::new("the-moon", "The Moon", 1),
//!         ],
//!     )
//!     .with_question("Should I take the new job?");
//!
//!     let reading = oracle.interpret("203.0.113.7", &request).await?;
//!     println!("{}", reading.story);
//!
//!     oracle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod metrics;
pub mod providers;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use error::{Result, SibylError};
pub use gateway::{Oracle, Sibyl, SibylBuilder};

pub use cache::{CacheStats, ResponseCache};
pub use limiter::{FixedWindowLimiter, RateDecision, UNKNOWN_IDENTITY, derive_identity};
pub use metrics::{MetricsExporter, ReadingOutcome, ServiceMetrics};
pub use providers::{CompletionsClient, NarrativeProvider};
pub use stream::{ChunkStream, FrameEvent, SseFrameDecoder, StreamOutcome};

// Re-export all request/response types
pub use types::{DrawnCard, Reading, ReadingRequest, StreamBudget, normalize_question};
