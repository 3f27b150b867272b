mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;

use prisma_server::api::{connected_greeting, handle_client_message, SharedState};
use prisma_server::events::ServerEvent;

use common::{frame_data_url, harness, next_event, MockGenerator};

fn frame_message(kind: &str) -> String {
    serde_json::json!({ "type": kind, "data": { "image": frame_data_url() } }).to_string()
}

#[test]
fn test_connected_greeting_json() {
    let json = serde_json::to_value(connected_greeting()).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "connected", "data": { "status": "connected" } }));
}

#[tokio::test]
async fn test_frame_message_is_tracked_only() {
    let h = harness(Duration::from_secs(30), MockGenerator::default());
    let state = SharedState::handle(h.pipeline.clone());
    let mut rx = state.subscribe();

    handle_client_message(&state, &frame_message("frame")).await;

    match rx.recv().await.unwrap() {
        ServerEvent::TrackingResults { is_person_detected, .. } => assert!(is_person_detected),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(h.pipeline.counters().transforms_started, 0);
}

#[tokio::test]
async fn test_transform_request_message_starts_transformation() {
    let h = harness(Duration::from_secs(30), MockGenerator::default());
    let state = SharedState::handle(h.pipeline.clone());
    let mut rx = state.subscribe();

    handle_client_message(&state, &frame_message("transform_request")).await;

    next_event(&mut rx, |e| *e == ServerEvent::TransformationStarted).await;
    next_event(&mut rx, |e| matches!(e, ServerEvent::TransformationResult { .. })).await;
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_toggle_message_announces_change() {
    let h = harness(Duration::from_secs(30), MockGenerator::default());
    let state = SharedState::handle(h.pipeline.clone());
    let mut rx = state.subscribe();

    handle_client_message(&state, r#"{"type":"toggle_auto_regenerate"}"#).await;
    assert_eq!(
        rx.recv().await.unwrap(),
        ServerEvent::AutoRegenerateChanged { auto_regenerate: false }
    );
    assert!(!h.gate.is_auto_regenerate());

    handle_client_message(&state, r#"{"type":"toggle_auto_regenerate"}"#).await;
    assert_eq!(
        rx.recv().await.unwrap(),
        ServerEvent::AutoRegenerateChanged { auto_regenerate: true }
    );
}

#[tokio::test]
async fn test_malformed_messages_are_ignored() {
    let h = harness(Duration::from_secs(30), MockGenerator::default());
    let state = SharedState::handle(h.pipeline.clone());
    let mut rx = state.subscribe();

    for text in ["not json", r#"{"type":"reboot"}"#, r#"{"type":"frame","data":{}}"#] {
        handle_client_message(&state, text).await;
    }
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(h.pipeline.counters().frames, 0);
}
