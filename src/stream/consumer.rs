//! Budgeted consumption of provider chunk streams.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::time::Instant;
use tracing::warn;

use super::frame::{FrameEvent, SseFrameDecoder};
use crate::Result;
use crate::types::StreamBudget;

/// Boxed fallible chunk stream as handed over by a provider.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// What one consumption produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub text: String,
    /// False when the budget deadline cut consumption short and `text`
    /// is a usable prefix of the full narrative.
    pub complete: bool,
    /// Malformed frames dropped along the way.
    pub frames_skipped: u64,
}

/// Accumulate narrative text from a framed chunk stream under `budget`.
///
/// The deadline runs from call time. On expiry, consumption stops
/// cooperatively (no further chunks are read) and the text gathered so
/// far is returned with `complete: false`. A transport error from the
/// chunk stream propagates as an error; malformed frames are counted and
/// skipped by the decoder.
pub async fn consume<S>(mut chunks: S, budget: StreamBudget) -> Result<StreamOutcome>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let deadline = Instant::now() + budget.timeout;
    let mut decoder = SseFrameDecoder::new();
    let mut text = String::new();

    loop {
        let chunk = match tokio::time::timeout_at(deadline, chunks.next()).await {
            Err(_) => {
                warn!(
                    accumulated = text.len(),
                    budget_ms = budget.timeout.as_millis() as u64,
                    "stream budget exhausted, returning partial narrative"
                );
                return Ok(StreamOutcome {
                    text,
                    complete: false,
                    frames_skipped: decoder.frames_skipped(),
                });
            }
            // Upstream closed without the sentinel: whatever arrived is
            // the whole narrative.
            Ok(None) => break,
            Ok(Some(chunk)) => chunk?,
        };

        for event in decoder.feed(&chunk) {
            match event {
                FrameEvent::Delta(delta) => text.push_str(&delta),
                FrameEvent::Done => {
                    return Ok(StreamOutcome {
                        text,
                        complete: true,
                        frames_skipped: decoder.frames_skipped(),
                    });
                }
            }
        }
    }

    Ok(StreamOutcome {
        text,
        complete: true,
        frames_skipped: decoder.frames_skipped(),
    })
}
