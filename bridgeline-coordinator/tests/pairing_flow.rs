//! End-to-end pairing flows through the coordinator and the in-memory store.

use bridgeline_coordinator::Coordinator;
use bridgeline_core::{
    AgentId, CallControlInstruction, CoordinatorConfig, LegId, NotificationError, PairingKey,
};
use bridgeline_notify::{NotificationDispatcher, RetryPolicy};
use bridgeline_test_utils::fixtures::{agent_with_token, initiate_request};
use bridgeline_test_utils::generators::{arb_agent_pair, arb_initiate_request, arb_leg_id};
use bridgeline_test_utils::{InMemoryPairingStore, PairingStore, RecordingNotifier};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn hold() -> Vec<CallControlInstruction> {
    vec![
        CallControlInstruction::speak("Please wait while we are connecting your call"),
        CallControlInstruction::pause(60),
    ]
}

fn bridge(leg: &str) -> Vec<CallControlInstruction> {
    vec![
        CallControlInstruction::pause(5),
        CallControlInstruction::speak("Agent connected successfully"),
        CallControlInstruction::bridge(LegId::from(leg)),
    ]
}

fn setup(notifier: RecordingNotifier) -> (Arc<InMemoryPairingStore>, Coordinator) {
    let store = Arc::new(InMemoryPairingStore::new());
    let dispatcher = NotificationDispatcher::new(
        Arc::new(notifier),
        RetryPolicy::new(2, Duration::from_millis(1)),
    );
    let coordinator = Coordinator::new(store.clone(), dispatcher, CoordinatorConfig::default());
    (store, coordinator)
}

#[tokio::test]
async fn a_calls_b_then_b_calls_a() {
    let (store, coordinator) = setup(RecordingNotifier::new());

    let first = coordinator
        .coordinate(initiate_request("A", "B", "leg-100"))
        .await
        .unwrap();
    assert_eq!(first, hold());

    let a = store.get(&AgentId::from("A")).await.unwrap().unwrap();
    assert_eq!(a.pairing_key, Some(PairingKey::from("B-A")));
    assert_eq!(a.pending_leg_id, Some(LegId::from("leg-100")));

    let second = coordinator
        .coordinate(initiate_request("B", "A", "leg-200"))
        .await
        .unwrap();
    assert_eq!(second, bridge("leg-100"));

    let a = store.get(&AgentId::from("A")).await.unwrap().unwrap();
    assert!(a.pairing_key.is_none());
    assert!(a.pending_leg_id.is_none());
    assert_eq!(store.pending_pairing_count(), 0);
}

#[tokio::test]
async fn third_call_after_bridge_is_fresh() {
    let (_store, coordinator) = setup(RecordingNotifier::new());

    coordinator
        .coordinate(initiate_request("A", "B", "leg-1"))
        .await
        .unwrap();
    coordinator
        .coordinate(initiate_request("B", "A", "leg-2"))
        .await
        .unwrap();

    let third = coordinator
        .coordinate(initiate_request("A", "B", "leg-3"))
        .await
        .unwrap();
    assert_eq!(third, hold());

    let fourth = coordinator
        .coordinate(initiate_request("B", "A", "leg-4"))
        .await
        .unwrap();
    assert_eq!(fourth, bridge("leg-3"));
}

#[tokio::test]
async fn lone_call_never_bridges() {
    let (_store, coordinator) = setup(RecordingNotifier::new());
    let out = coordinator
        .coordinate(initiate_request("X", "Y", "leg-9"))
        .await
        .unwrap();
    assert_eq!(out, hold());
    assert!(!out.iter().any(CallControlInstruction::is_bridge));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_second_legs_bridge_exactly_once() {
    for _ in 0..20 {
        let (_store, coordinator) = setup(RecordingNotifier::new());
        coordinator
            .coordinate(initiate_request("A", "B", "leg-first"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .coordinate(initiate_request("B", "A", &format!("leg-reply-{}", i)))
                    .await
                    .unwrap()
            }));
        }

        let mut bridges = 0;
        for handle in handles {
            let out = handle.await.unwrap();
            assert!(!out.is_empty());
            if out.iter().any(CallControlInstruction::is_bridge) {
                assert_eq!(out, bridge("leg-first"));
                bridges += 1;
            } else {
                assert_eq!(out, hold());
            }
        }
        assert_eq!(bridges, 1);
    }
}

#[tokio::test]
async fn notification_failure_does_not_change_output() {
    let notifier = RecordingNotifier::failing_with(NotificationError::RequestFailed {
        provider: "recording".to_string(),
        status: 500,
        message: "boom".to_string(),
    });
    let (store, coordinator) = setup(notifier.clone());
    store.insert(agent_with_token("B", "device-b")).unwrap();

    let out = coordinator
        .coordinate(initiate_request("A", "B", "leg-1"))
        .await
        .unwrap();
    assert_eq!(out, hold());

    assert!(notifier.wait_for_attempts(2, Duration::from_secs(2)).await);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn slow_notification_does_not_block_the_call() {
    let notifier = RecordingNotifier::new().with_delay(Duration::from_secs(30));
    let (store, coordinator) = setup(notifier);
    store.insert(agent_with_token("B", "device-b")).unwrap();

    let started = Instant::now();
    let out = coordinator
        .coordinate(initiate_request("A", "B", "leg-1"))
        .await
        .unwrap();
    assert_eq!(out, hold());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn aliased_callback_body_pairs() {
    let (_store, coordinator) = setup(RecordingNotifier::new());

    let first = serde_json_request(
        r#"{"accountId":"1","applicationId":"app","from":"A","to":"B","callId":"c-1","eventType":"initiate"}"#,
    );
    let second = serde_json_request(
        r#"{"accountId":"1","applicationId":"app","from":"B","to":"A","callId":"c-2","eventType":"initiate"}"#,
    );

    assert_eq!(coordinator.coordinate(first).await.unwrap(), hold());
    assert_eq!(coordinator.coordinate(second).await.unwrap(), bridge("c-1"));
}

fn serde_json_request(body: &str) -> bridgeline_core::InitiateRequest {
    serde_json::from_str(body).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reply_leg_bridges_to_first_leg(
        (caller, callee) in arb_agent_pair(),
        first_leg in arb_leg_id(),
        reply_leg in arb_leg_id(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let (first, second) = rt.block_on(async {
            let (_store, coordinator) = setup(RecordingNotifier::new());
            let first = coordinator
                .coordinate(initiate_request(caller.as_str(), callee.as_str(), first_leg.as_str()))
                .await
                .unwrap();
            let second = coordinator
                .coordinate(initiate_request(callee.as_str(), caller.as_str(), reply_leg.as_str()))
                .await
                .unwrap();
            (first, second)
        });

        prop_assert_eq!(first, hold());
        prop_assert_eq!(second, bridge(first_leg.as_str()));
    }

    #[test]
    fn lone_valid_request_holds_and_records_reply_key(request in arb_initiate_request()) {
        let caller = AgentId::new(request.caller_id.clone().unwrap());
        let callee = AgentId::new(request.callee_id.clone().unwrap());
        let leg = LegId::new(request.leg_id.clone().unwrap());
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let (out, record) = rt.block_on(async {
            let (store, coordinator) = setup(RecordingNotifier::new());
            let out = coordinator.coordinate(request).await.unwrap();
            let record = store.get(&caller).await.unwrap().unwrap();
            (out, record)
        });

        prop_assert_eq!(out, hold());
        prop_assert_eq!(record.pairing_key, Some(PairingKey::between(&callee, &caller)));
        prop_assert_eq!(record.pending_leg_id, Some(leg));
    }
}
