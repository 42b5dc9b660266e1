//! Adaptive generation budgets

use std::time::Duration;

/// Token and wall-clock budget for one upstream generation. Recomputed
/// per request from the card count, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamBudget {
    /// Requested generation size, passed upstream as `max_tokens`. Advisory:
    /// the received text is not re-counted against it.
    pub token_limit: u32,
    /// Hard wall-clock bound on stream consumption, measured from stream
    /// start. On expiry the accumulated text is returned as a partial.
    pub timeout: Duration,
}

impl StreamBudget {
    /// Budget tier for a spread of `card_count` cards. Larger spreads get
    /// longer narratives and proportionally more time; both values are
    /// non-decreasing in the card count.
    pub fn for_cards(card_count: usize) -> Self {
        let (token_limit, timeout_ms) = match card_count {
            0..=3 => (300, 5_000),
            4..=5 => (500, 6_000),
            6..=9 => (700, 7_000),
            _ => (2_200, 9_500),
        };
        Self {
            token_limit,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}
