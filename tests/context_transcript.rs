mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use proptest::prelude::*;
use serde_json::json;

use threadloom::context::{
    ContextProvider, HttpSessionDirectory, IncrementalContext, NO_HISTORY, RawMessage,
    RawSession, SessionDirectory, sort_chronological,
};

use common::{FakeDirectory, raw_message, session};

fn sessions_with_history() -> Vec<RawSession> {
    vec![
        RawSession {
            id: "s2".into(),
            protocol_number: "P1".into(),
            // Deliberately out of order within the record.
            messages: vec![
                raw_message("anything else?", 11, 0, false),
                raw_message("my card was charged twice", 10, 30, true),
            ],
        },
        RawSession {
            id: "other".into(),
            protocol_number: "P9".into(),
            messages: vec![raw_message("unrelated protocol", 9, 0, true)],
        },
        RawSession {
            id: "s1".into(),
            protocol_number: "P1".into(),
            messages: vec![raw_message("hello, I need help", 10, 0, true)],
        },
    ]
}

#[tokio::test]
async fn full_history_flattens_and_sorts_across_sessions() {
    let provider = ContextProvider::new(Arc::new(FakeDirectory::with_sessions(
        sessions_with_history(),
    )));
    let block = provider.full_history(&session()).await;

    let hello = block.text.find("hello, I need help").unwrap();
    let charged = block.text.find("my card was charged twice").unwrap();
    let anything = block.text.find("anything else?").unwrap();
    assert!(hello < charged && charged < anything);

    // Other protocols are filtered out entirely.
    assert!(!block.text.contains("unrelated protocol"));
    assert_eq!(
        block.newest,
        Some(Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn full_history_classifies_speakers() {
    let provider = ContextProvider::new(Arc::new(FakeDirectory::with_sessions(
        sessions_with_history(),
    )));
    let block = provider.full_history(&session()).await;
    assert!(block.text.contains("Customer: hello, I need help"));
    assert!(block.text.contains("Agent: anything else?"));
}

#[tokio::test]
async fn full_history_without_matches_returns_sentinel() {
    let provider = ContextProvider::new(Arc::new(FakeDirectory::with_sessions(vec![
        RawSession {
            id: "other".into(),
            protocol_number: "P9".into(),
            messages: vec![raw_message("different protocol", 9, 0, true)],
        },
    ])));
    let block = provider.full_history(&session()).await;
    assert_eq!(block.text, NO_HISTORY);
    assert_eq!(block.newest, None);
}

#[tokio::test]
async fn transport_failure_becomes_error_text_not_a_panic() {
    let directory = FakeDirectory {
        fail: true,
        ..FakeDirectory::default()
    };
    let provider = ContextProvider::new(Arc::new(directory));

    let block = provider.full_history(&session()).await;
    assert!(block.failed);
    assert!(block.text.starts_with("[context unavailable]"));
    assert_eq!(block.newest, None);

    match provider.incremental(&session(), None).await {
        IncrementalContext::Context(block) => {
            assert!(block.failed);
            assert!(block.text.starts_with("[context unavailable]"));
            assert_eq!(block.newest, None);
        }
        IncrementalContext::NothingNew => panic!("error must surface as text"),
    }
}

#[tokio::test]
async fn incremental_filters_strictly_newer_than_watermark() {
    let directory = FakeDirectory {
        session_messages: vec![
            raw_message("old message", 10, 55, true),
            raw_message("new message", 11, 5, true),
        ],
        ..FakeDirectory::default()
    };
    let provider = ContextProvider::new(Arc::new(directory));
    let watermark = Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap();

    match provider.incremental(&session(), Some(watermark)).await {
        IncrementalContext::Context(block) => {
            assert!(block.text.contains("new message"));
            assert!(!block.text.contains("old message"));
            assert_eq!(
                block.newest,
                Some(Utc.with_ymd_and_hms(2025, 6, 1, 11, 5, 0).unwrap())
            );
        }
        IncrementalContext::NothingNew => panic!("one message is newer than the watermark"),
    }
}

#[tokio::test]
async fn incremental_with_nothing_new_is_a_sentinel_and_idempotent() {
    let directory = FakeDirectory {
        session_messages: vec![raw_message("old message", 10, 55, true)],
        ..FakeDirectory::default()
    };
    let provider = ContextProvider::new(Arc::new(directory));
    let watermark = Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap();

    // Same watermark, same answer, both times.
    for _ in 0..2 {
        assert_eq!(
            provider.incremental(&session(), Some(watermark)).await,
            IncrementalContext::NothingNew
        );
    }
}

#[tokio::test]
async fn incremental_message_at_watermark_is_not_new() {
    let at_watermark = Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap();
    let directory = FakeDirectory {
        session_messages: vec![raw_message("boundary", 11, 0, true)],
        ..FakeDirectory::default()
    };
    let provider = ContextProvider::new(Arc::new(directory));
    assert_eq!(
        provider.incremental(&session(), Some(at_watermark)).await,
        IncrementalContext::NothingNew
    );
}

#[tokio::test]
async fn http_directory_parses_camel_case_listings() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/contacts/C1/sessions");
            then.status(200).json_body(json!([
                {
                    "id": "s1",
                    "protocolNumber": "P1",
                    "messages": [
                        {
                            "text": "hi",
                            "sentAt": "2025-06-01T10:00:00Z",
                            "fromContact": true,
                            "automated": false
                        }
                    ]
                }
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/sessions/A1/messages");
            then.status(200).json_body(json!([
                { "text": "ping", "sentAt": "2025-06-01T11:05:00Z", "fromContact": true }
            ]));
        })
        .await;

    let directory = HttpSessionDirectory::new().unwrap();
    let sessions = directory
        .sessions_for_contact(&server.base_url(), "C1")
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].protocol_number, "P1");
    assert!(sessions[0].messages[0].from_contact);

    let messages = directory
        .messages_for_session(&server.base_url(), "A1")
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].sent_at,
        Utc.with_ymd_and_hms(2025, 6, 1, 11, 5, 0).unwrap()
    );
}

#[tokio::test]
async fn http_directory_maps_error_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/contacts/C1/sessions");
            then.status(500);
        })
        .await;

    let directory = HttpSessionDirectory::new().unwrap();
    let err = directory
        .sessions_for_contact(&server.base_url(), "C1")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
}

proptest! {
    #[test]
    fn sorted_transcripts_are_non_decreasing(offsets in proptest::collection::vec(0u32..10_000, 0..40)) {
        let mut messages: Vec<RawMessage> = offsets
            .iter()
            .map(|&offset| RawMessage {
                text: format!("m{offset}"),
                sent_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::seconds(i64::from(offset)),
                from_contact: offset % 2 == 0,
                automated: false,
            })
            .collect();
        sort_chronological(&mut messages);
        prop_assert!(messages.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));
    }
}
