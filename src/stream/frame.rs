//! Incremental decoding of `data:`-framed event streams.

use bytes::BytesMut;
use serde::Deserialize;
use tracing::debug;

/// One decoded framing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Incremental narrative text from one frame.
    Delta(String),
    /// The `[DONE]` sentinel: normal end of stream, never parsed as JSON.
    Done,
}

/// Incremental decoder for `data: <payload>` framed streams.
///
/// Feed raw chunks in arrival order; complete lines are decoded as they
/// close and the trailing partial line is carried over to the next chunk.
/// The carry buffer is bytes, not text, so a chunk boundary inside a
/// multi-byte character is harmless. A payload that fails structured
/// parsing is counted and skipped; blank separator lines and non-`data:`
/// lines (comments, other fields) are ignored.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    carry: BytesMut,
    frames_skipped: u64,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk, returning the events it completed.
    ///
    /// A trailing line the stream never terminates is incomplete by
    /// definition and stays in the carry buffer.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        self.carry.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.carry.iter().position(|&byte| byte == b'\n') {
            let line = self.carry.split_to(newline + 1);
            let mut line = &line[..line.len() - 1];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            if let Some(event) = self.decode_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Malformed frames dropped so far.
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<FrameEvent> {
        if line.is_empty() {
            return None;
        }
        let Ok(text) = std::str::from_utf8(line) else {
            self.frames_skipped += 1;
            debug!("skipping non-utf8 stream line");
            return None;
        };
        let rest = text.strip_prefix("data:")?;
        let payload = rest.strip_prefix(' ').unwrap_or(rest);
        if payload == "[DONE]" {
            return Some(FrameEvent::Done);
        }
        match parse_delta(payload) {
            Ok(Some(delta)) => Some(FrameEvent::Delta(delta)),
            // Valid frame without narrative content (role headers, finish
            // frames) contributes nothing.
            Ok(None) => None,
            Err(error) => {
                self.frames_skipped += 1;
                debug!(%error, "skipping malformed stream frame");
                None
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// Fallible per-frame parse: the incremental delta lives at the fixed
/// path `choices[0].delta.content`.
fn parse_delta(payload: &str) -> serde_json::Result<Option<String>> {
    let chunk: CompletionChunk = serde_json::from_str(payload)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
}
