//! End-to-end oracle behavior against a mocked completions endpoint.
//!
//! These tests drive [`Oracle::interpret`] through the real HTTP client
//! and stream consumer, with wiremock standing in for the upstream.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sibyl::{DrawnCard, Oracle, ReadingRequest, Sibyl, SibylError};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": delta}}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn sse_response(deltas: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(sse_body(deltas), "text/event-stream")
}

fn three_cards() -> Vec<DrawnCard> {
    vec![
        DrawnCard::new("the-sun", "The Sun", 0),
        DrawnCard::new("the-moon", "The Moon", 1),
        DrawnCard::new("the-star", "The Star", 2),
    ]
}

fn reading_request() -> ReadingRequest {
    ReadingRequest::new("three-card", 1, "en", three_cards())
        .with_question("Should I take the new job?")
}

async fn oracle_against(server: &MockServer) -> Oracle {
    Sibyl::builder()
        .api_key("sk-test")
        .base_url(server.uri())
        .rate_limit(10, Duration::from_secs(60))
        .build()
        .expect("oracle should build")
}

/// Test a full successful interpretation, including the budget-sized
/// upstream request.
#[tokio::test]
async fn test_reading_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(
            serde_json::json!({"max_tokens": 300, "stream": true}),
        ))
        .respond_with(sse_response(&["The Sun ", "lights the way."]))
        .mount(&mock_server)
        .await;

    let oracle = oracle_against(&mock_server).await;
    let reading = oracle
        .interpret("203.0.113.7", &reading_request())
        .await
        .expect("interpretation should succeed");

    assert_eq!(reading.story, "The Sun lights the way.");
    assert!(reading.complete);

    oracle.shutdown().await;
}

/// Test that the timing trailer is lifted off the narrative.
#[tokio::test]
async fn test_reading_extracts_timing_trailer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(sse_response(&[
            "The road opens.",
            "\n{\"timingDays\": 3, \"deadline\": \"2026-08-24\", \"task\": \"send the letter\"}",
        ]))
        .mount(&mock_server)
        .await;

    let oracle = oracle_against(&mock_server).await;
    let reading = oracle
        .interpret("203.0.113.7", &reading_request())
        .await
        .expect("interpretation should succeed");

    assert_eq!(reading.story, "The road opens.");
    assert_eq!(reading.timing_days, Some(3));
    assert_eq!(reading.task.as_deref(), Some("send the letter"));

    oracle.shutdown().await;
}

/// Test that a repeated identical request is served from cache without a
/// second upstream call.
#[tokio::test]
async fn test_repeat_request_is_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(sse_response(&["The cards repeat themselves."]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let oracle = oracle_against(&mock_server).await;
    let request = reading_request();

    let first = oracle.interpret("203.0.113.7", &request).await.unwrap();
    let second = oracle.interpret("203.0.113.7", &request).await.unwrap();
    assert_eq!(first.story, second.story);

    let stats = oracle.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);

    oracle.shutdown().await;
}

/// Test that identical concurrent requests coalesce onto one upstream
/// call.
#[tokio::test]
async fn test_concurrent_requests_coalesce() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(
            sse_response(&["One stream, many listeners."])
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let oracle = oracle_against(&mock_server).await;
    let request = reading_request();

    let (first, second) = tokio::join!(
        oracle.interpret("203.0.113.7", &request),
        oracle.interpret("198.51.100.4", &request),
    );
    assert_eq!(first.unwrap().story, "One stream, many listeners.");
    assert_eq!(second.unwrap().story, "One stream, many listeners.");

    let stats = oracle.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.coalesced_waits, 1);

    oracle.shutdown().await;
}

/// Test that a request with no cards is refused before any upstream or
/// rate-limit work.
#[tokio::test]
async fn test_validation_rejects_empty_cards() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(sse_response(&["never sent"]))
        .expect(0)
        .mount(&mock_server)
        .await;

    let oracle = oracle_against(&mock_server).await;
    let request = ReadingRequest::new("three-card", 1, "en", vec![]);
    let result = oracle.interpret("203.0.113.7", &request).await;

    assert!(
        matches!(result, Err(SibylError::Validation(_))),
        "expected Validation, got {:?}",
        result
    );

    oracle.shutdown().await;
}

/// Test that a caller over its window gets RateLimited with a usable
/// retry hint.
#[tokio::test]
async fn test_rate_limit_denial_carries_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(sse_response(&["The first one passes."]))
        .mount(&mock_server)
        .await;

    let oracle = Sibyl::builder()
        .api_key("sk-test")
        .base_url(mock_server.uri())
        .rate_limit(1, Duration::from_secs(60))
        .build()
        .expect("oracle should build");

    let request = reading_request();
    oracle
        .interpret("203.0.113.7", &request)
        .await
        .expect("first request should pass");

    let denied = oracle.interpret("203.0.113.7", &request).await;
    match denied {
        Err(SibylError::RateLimited { retry_after, limit }) => {
            assert_eq!(limit, 1);
            assert!(retry_after > Duration::ZERO);
            assert!(retry_after <= Duration::from_secs(60));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }

    oracle.shutdown().await;
}

/// Test that an upstream 5xx maps to the one Upstream error callers are
/// promised.
#[tokio::test]
async fn test_upstream_failure_maps_to_upstream_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let oracle = oracle_against(&mock_server).await;
    let result = oracle.interpret("203.0.113.7", &reading_request()).await;

    assert!(
        matches!(result, Err(SibylError::Upstream(_))),
        "expected Upstream, got {:?}",
        result
    );

    oracle.shutdown().await;
}

/// Test that malformed frames are skipped, the rest of the narrative
/// survives, and the skip shows up in the exposition.
#[tokio::test]
async fn test_malformed_frames_are_skipped_end_to_end() {
    let mock_server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Kept. \"}}]}\n\n",
        "data: {broken\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Also kept.\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let oracle = oracle_against(&mock_server).await;
    let reading = oracle
        .interpret("203.0.113.7", &reading_request())
        .await
        .expect("interpretation should survive bad frames");

    assert_eq!(reading.story, "Kept. Also kept.");
    assert!(reading.complete);

    let exposition = oracle.export_metrics();
    assert!(exposition.contains("sibyl_stream_frames_skipped_total 1"));
    assert!(exposition.contains("sibyl_readings_total{outcome=\"ok\"} 1"));

    oracle.shutdown().await;
}

/// Test that a stream stalled past its budget yields a partial reading,
/// not an error.
#[tokio::test(start_paused = true)]
async fn test_stalled_stream_yields_partial_reading() {
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::{StreamExt, stream};
    use sibyl::stream::ChunkStream;
    use sibyl::types::StreamBudget;
    use sibyl::{NarrativeProvider, Result};

    struct StallingProvider;

    #[async_trait]
    impl NarrativeProvider for StallingProvider {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn open_stream(
            &self,
            _request: &ReadingRequest,
            _budget: StreamBudget,
        ) -> Result<ChunkStream> {
            let opening: Result<Bytes> = Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Half a tale\"}}]}\n\n",
            ));
            Ok(Box::pin(
                stream::iter(vec![opening]).chain(stream::pending()),
            ))
        }
    }

    let oracle = Sibyl::builder()
        .provider(Arc::new(StallingProvider))
        .build()
        .expect("oracle should build");

    let reading = oracle
        .interpret("203.0.113.7", &reading_request())
        .await
        .expect("a stalled stream is a partial success");

    assert_eq!(reading.story, "Half a tale");
    assert!(!reading.complete);

    let exposition = oracle.export_metrics();
    assert!(exposition.contains("sibyl_readings_total{outcome=\"partial\"} 1"));

    oracle.shutdown().await;
}
