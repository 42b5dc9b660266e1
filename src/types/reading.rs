//! Interpretation result types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A delivered interpretation: the narrative plus any structured timing
/// metadata the provider appended, and whether the stream ran to its
/// natural end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub story: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// False when the deadline cut the stream short and the story is a
    /// usable prefix of the full narrative.
    pub complete: bool,
}

/// Trailer the provider is asked to append as the narrative's last line.
/// Unknown keys are rejected so a JSON-looking line that belongs to the
/// story is never mistaken for metadata.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TimingTrailer {
    timing_days: Option<u32>,
    deadline: Option<NaiveDate>,
    task: Option<String>,
}

impl Reading {
    /// Package accumulated narrative text into a `Reading`, splitting off
    /// a trailing single-line JSON timing trailer when one parses.
    pub fn from_narrative(text: impl Into<String>, complete: bool) -> Self {
        let text = text.into();
        let trimmed = text.trim_end();
        let last_line_start = trimmed.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let last_line = trimmed[last_line_start..].trim();

        if last_line.starts_with('{') && last_line.ends_with('}') {
            if let Ok(trailer) = serde_json::from_str::<TimingTrailer>(last_line) {
                return Self {
                    story: trimmed[..last_line_start].trim_end().to_string(),
                    timing_days: trailer.timing_days,
                    deadline: trailer.deadline,
                    task: trailer.task,
                    complete,
                };
            }
        }

        Self {
            story: trimmed.to_string(),
            timing_days: None,
            deadline: None,
            task: None,
            complete,
        }
    }
}
