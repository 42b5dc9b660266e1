//! Upstream stream consumption.
//!
//! The provider delivers generated narrative as a framed event stream:
//! lines of the form `data: <json>` separated by blank lines, closed by
//! the literal `data: [DONE]`. Chunks arrive with no alignment guarantee;
//! a chunk may hold several frames or cut a frame (even a single UTF-8
//! code point) in half.
//!
//! [`SseFrameDecoder`] turns raw chunks into frame events, carrying the
//! unconsumed trailing partial line between chunks and counting frames
//! whose payload fails to parse instead of failing the stream.
//! [`consume`] drives a decoder over a chunk stream under a
//! [`StreamBudget`](crate::types::StreamBudget) deadline, returning the
//! accumulated text and whether the stream ran to its natural end.

mod consumer;
mod frame;

pub use consumer::{ChunkStream, StreamOutcome, consume};
pub use frame::{FrameEvent, SseFrameDecoder};
