//! Stream reassembly under adversarial chunking.
//!
//! The upstream is free to split its event stream at any byte, including
//! inside a frame, inside a multi-byte character, or between the `data:`
//! prefix and its payload. Reassembly must not depend on chunk shape.

use bytes::Bytes;
use futures_util::stream;

use sibyl::StreamBudget;
use sibyl::stream::consume;

const SSE_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"The Sun \"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"gr\u{00e9}ets \"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"the Moon.\"}}]}\n\n",
    "data: [DONE]\n\n",
);
const EXPECTED: &str = "The Sun gr\u{00e9}ets the Moon.";

/// Test that every possible two-chunk split reconstructs the same
/// narrative.
#[tokio::test]
async fn test_reassembly_at_every_split_offset() {
    let body = SSE_BODY.as_bytes();
    for offset in 0..=body.len() {
        let chunks = vec![
            Ok(Bytes::copy_from_slice(&body[..offset])),
            Ok(Bytes::copy_from_slice(&body[offset..])),
        ];
        let outcome = consume(stream::iter(chunks), StreamBudget::for_cards(3))
            .await
            .expect("stream should reassemble");
        assert!(outcome.complete, "offset {offset}");
        assert_eq!(outcome.text, EXPECTED, "offset {offset}");
        assert_eq!(outcome.frames_skipped, 0, "offset {offset}");
    }
}

/// Test the worst case carry-over: one byte per chunk.
#[tokio::test]
async fn test_reassembly_byte_by_byte() {
    let chunks: Vec<_> = SSE_BODY
        .as_bytes()
        .iter()
        .map(|byte| Ok(Bytes::copy_from_slice(&[*byte])))
        .collect();
    let outcome = consume(stream::iter(chunks), StreamBudget::for_cards(3))
        .await
        .expect("stream should reassemble");
    assert!(outcome.complete);
    assert_eq!(outcome.text, EXPECTED);
    assert_eq!(outcome.frames_skipped, 0);
}

/// Test that malformed frames are counted and skipped while later frames
/// still land.
#[tokio::test]
async fn test_malformed_frames_are_counted_and_skipped() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Before \"}}]}\n\n",
        "data: {not json}\n\n",
        "data: \n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"after.\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    let chunks = vec![Ok(Bytes::from_static(body.as_bytes()))];
    let outcome = consume(stream::iter(chunks), StreamBudget::for_cards(3))
        .await
        .expect("stream should reassemble");
    assert!(outcome.complete);
    assert_eq!(outcome.text, "Before after.");
    assert_eq!(outcome.frames_skipped, 2);
}
