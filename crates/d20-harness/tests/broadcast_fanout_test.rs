//! Broadcast fan-out tests
//!
//! One publish must reach every draining observer with the identical payload,
//! and a stalled observer must cost the publisher nothing.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use d20_core::{
    BroadcastHub, DiceEngine, EventKind, HubConfig, Observer, RenderError, RollRequest,
    SnapshotRenderer, TableState,
};
use d20_harness::{RecordingSink, SimEnv, player};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

/// Spawn `n` draining observers and return their sinks.
fn spawn_observers(
    hub: &BroadcastHub,
    n: usize,
    cancel: &CancellationToken,
) -> Vec<RecordingSink> {
    (0..n)
        .map(|_| {
            let sink = RecordingSink::new();
            let observer = Observer::connect(hub);
            tokio::spawn(observer.run(sink.clone(), cancel.clone()));
            sink
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_publish_reaches_five_draining_observers() {
    let hub = BroadcastHub::new();
    let table = TableState::new();
    let cancel = CancellationToken::new();
    let sinks = spawn_observers(&hub, 5, &cancel);

    let engine = DiceEngine::new(SimEnv::with_seed(1));
    table.append_roll(engine.roll(RollRequest::new(20, 2), &player("Ana")).unwrap());

    let report = hub.publish(EventKind::Roll, &table);
    assert_eq!(report.delivered, 5);
    assert_eq!(report.skipped, 0);

    for sink in &sinks {
        tokio::time::timeout(WAIT, sink.wait_for(1)).await.expect("observer never received");
    }

    let first = sinks[0].events()[0].clone();
    assert_eq!(first.kind, EventKind::Roll);
    for sink in &sinks {
        assert_eq!(sink.events().len(), 1);
        assert!(Arc::ptr_eq(&sink.events()[0], &first), "payload was re-rendered per observer");
    }

    let body: serde_json::Value = serde_json::from_str(&first.data).unwrap();
    assert_eq!(body["history"].as_array().map(Vec::len), Some(1));

    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stalled_observer_misses_event_without_blocking_publisher() {
    let hub = BroadcastHub::new();
    let table = TableState::new();
    let cancel = CancellationToken::new();
    let sinks = spawn_observers(&hub, 5, &cancel);

    // Never drained: after one event its queue stays full.
    let mut stalled = hub.register();
    let prefill = hub.publish(EventKind::Stats, &table);
    assert_eq!(prefill.delivered, 6);

    for sink in &sinks {
        tokio::time::timeout(WAIT, sink.wait_for(1)).await.unwrap();
    }

    table.set_threat(7);
    let started = Instant::now();
    let report = hub.publish(EventKind::Stats, &table);
    assert!(started.elapsed() < Duration::from_secs(1), "publish blocked");

    assert_eq!(report.skipped, 1);
    assert_eq!(report.delivered, 5);

    for sink in &sinks {
        tokio::time::timeout(WAIT, sink.wait_for(2)).await.unwrap();
        let latest = sink.events()[1].clone();
        let body: serde_json::Value = serde_json::from_str(&latest.data).unwrap();
        assert_eq!(body["threat"], 7);
    }

    // The stalled observer only holds the stale first snapshot.
    let held = stalled.try_recv().expect("prefilled event");
    let body: serde_json::Value = serde_json::from_str(&held.data).unwrap();
    assert_eq!(body["threat"], 0);
    assert!(stalled.try_recv().is_none());

    cancel.cancel();
}

#[tokio::test]
async fn larger_queue_buffers_events_for_slow_reader() {
    let hub = BroadcastHub::with_config(HubConfig { queue_capacity: 3 });
    let table = TableState::new();
    let mut slow = hub.register();

    let reports: Vec<_> = (0..4).map(|_| hub.publish(EventKind::Stats, &table)).collect();

    assert_eq!(reports.iter().map(|r| r.delivered).sum::<usize>(), 3);
    assert_eq!(reports[3].skipped, 1);

    let mut received = 0;
    while slow.try_recv().is_some() {
        received += 1;
    }
    assert_eq!(received, 3);
}

#[tokio::test]
async fn publish_with_no_observers_is_a_no_op() {
    let hub = BroadcastHub::new();
    let report = hub.publish(EventKind::Roll, &TableState::new());

    assert!(report.rendered);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.skipped, 0);
}

struct BrokenRenderer;

impl SnapshotRenderer for BrokenRenderer {
    fn render(&self, kind: EventKind, _table: &TableState) -> Result<String, RenderError> {
        Err(RenderError { kind, reason: "template missing".to_string() })
    }
}

#[tokio::test]
async fn render_failure_is_survivable() {
    let hub = BroadcastHub::with_renderer(HubConfig::default(), BrokenRenderer);
    let mut sub = hub.register();

    let report = hub.publish(EventKind::Stats, &TableState::new());

    assert!(!report.rendered);
    assert!(sub.try_recv().is_none());
    assert_eq!(hub.observer_count(), 1);

    // Hub keeps working for pre-rendered events.
    let report = hub.deliver(d20_core::TableEvent { kind: EventKind::Stats, data: "{}".into() });
    assert_eq!(report.delivered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unregister_during_publish_storm_never_deadlocks() {
    let hub = BroadcastHub::new();
    let table = Arc::new(TableState::new());

    let publisher = {
        let hub = hub.clone();
        let table = Arc::clone(&table);
        tokio::task::spawn_blocking(move || {
            for i in 0..2_000 {
                table.set_momentum(i);
                hub.publish(EventKind::Stats, &table);
            }
        })
    };

    let churn = {
        let hub = hub.clone();
        tokio::task::spawn_blocking(move || {
            for _ in 0..2_000 {
                let sub = hub.register();
                let id = sub.id();
                hub.unregister(id);
                drop(sub);
            }
        })
    };

    tokio::time::timeout(Duration::from_secs(30), async {
        publisher.await.unwrap();
        churn.await.unwrap();
    })
    .await
    .expect("publish/unregister deadlocked");

    assert_eq!(hub.observer_count(), 0);
}
