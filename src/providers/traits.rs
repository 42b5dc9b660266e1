//! Provider trait for upstream narrative sources.

use async_trait::async_trait;

use crate::Result;
use crate::stream::ChunkStream;
use crate::types::{ReadingRequest, StreamBudget};

/// An upstream source of streamed narrative text.
///
/// A provider only negotiates the HTTP exchange and hands back raw
/// chunks; decoding, deadlines, and caching live above it. The seam
/// exists so tests and embedders can substitute the upstream without
/// touching orchestration.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Open the upstream stream for `request`, asking for at most
    /// `budget.token_limit` tokens of narrative.
    async fn open_stream(
        &self,
        request: &ReadingRequest,
        budget: StreamBudget,
    ) -> Result<ChunkStream>;
}
