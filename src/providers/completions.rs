//! OpenAI-compatible streaming chat-completions client.
//!
//! The production [`NarrativeProvider`]: posts a structured completion
//! request built from the reading and returns the raw `text/event-stream`
//! body for the consumer to decode.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;

use super::traits::NarrativeProvider;
use crate::stream::ChunkStream;
use crate::types::{ReadingRequest, StreamBudget};
use crate::{Result, SibylError};

/// Default base URL for the completions API
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default upstream model
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Margin added to the stream budget for the per-request transport guard,
/// covering connection setup and time to first byte. The guard must sit
/// above the consume deadline so the deadline, not the socket, decides
/// truncation.
const TRANSPORT_MARGIN: Duration = Duration::from_secs(5);

/// Client for an OpenAI-compatible streaming completions endpoint.
#[derive(Clone)]
pub struct CompletionsClient {
    api_key: String,
    model: String,
    http: Client,
    base_url: String,
}

impl CompletionsClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            http,
            base_url: base_url.into(),
        }
    }

    /// Use a different upstream model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn handle_response_errors(&self, response: &reqwest::Response) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            401 => Err(SibylError::AuthenticationFailed),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(SibylError::ProviderThrottled { retry_after })
            }
            code => Err(SibylError::Api {
                status: code,
                message: format!("completions API error: {}", status),
            }),
        }
    }
}

#[async_trait]
impl NarrativeProvider for CompletionsClient {
    fn name(&self) -> &str {
        "completions"
    }

    async fn open_stream(
        &self,
        request: &ReadingRequest,
        budget: StreamBudget,
    ) -> Result<ChunkStream> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = CompletionsRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: system_prompt(&request.locale),
                },
                WireMessage {
                    role: "user",
                    content: user_prompt(request),
                },
            ],
            max_tokens: budget.token_limit,
            stream: true,
        };

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(budget.timeout + TRANSPORT_MARGIN)
            .json(&body)
            .send()
            .await
            .map_err(|e| SibylError::Http(e.to_string()))?;

        self.handle_response_errors(&response)?;

        let chunks = response
            .bytes_stream()
            .map(|item| item.map_err(|e| SibylError::Stream(e.to_string())));
        Ok(Box::pin(chunks))
    }
}

#[derive(Serialize)]
struct CompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: String,
}

fn system_prompt(locale: &str) -> String {
    format!(
        "You are an experienced tarot reader. Interpret the drawn spread as one \
         flowing narrative in locale '{locale}'. When the reading implies concrete \
         timing, end with a single JSON line of the form \
         {{\"timingDays\": <int>, \"deadline\": \"YYYY-MM-DD\", \"task\": <text>}}."
    )
}

fn user_prompt(request: &ReadingRequest) -> String {
    let mut cards: Vec<_> = request.cards.iter().collect();
    cards.sort_by_key(|card| card.position);
    let list = cards
        .iter()
        .map(|card| format!("{} at position {}", card.name, card.position))
        .collect::<Vec<_>>()
        .join("; ");

    let question = if request.question.trim().is_empty() {
        "(open reading)".to_string()
    } else {
        request.question.clone()
    };

    format!(
        "Spread: {} (layout {}). Cards: {}. Question: {}",
        request.spread_id, request.layout_type, list, question
    )
}
