//! Fuzz target for [`TableState`] and [`BroadcastHub`] operation sequences
//!
//! # Strategy
//!
//! - Arbitrary interleavings of appends, stats updates, registrations,
//!   unregistrations and publishes
//! - Timestamps chosen by the fuzzer, including duplicates and regressions
//!
//! # Invariants
//!
//! - History is always most-recent-first and never loses an entry
//! - Equal timestamps come back latest-append first
//! - Character trait map never holds an empty list
//! - Observer count matches live subscriptions
//! - A publish never delivers to more observers than are registered

#![no_main]

use std::time::{Duration, SystemTime};

use arbitrary::Arbitrary;
use d20_core::{
    BroadcastHub, DieOutcome, EventKind, Participant, Roll, StatsUpdate, Subscription, TableState,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Append { at_secs: u16 },
    Threat(i64),
    Momentum(i64),
    SceneTraits(Vec<String>),
    CharacterTraits { name: u8, traits: Vec<String> },
    Update { threat: Option<i64>, momentum: Option<i64> },
    Register,
    Unregister { slot: u8 },
    Drain { slot: u8 },
    Publish { stats: bool },
}

fuzz_target!(|ops: Vec<Op>| {
    let table = TableState::new();
    let hub = BroadcastHub::new();
    let mut subscriptions: Vec<Subscription> = Vec::new();
    let mut appended = 0i64;

    for op in ops {
        match op {
            Op::Append { at_secs } => {
                table.append_roll(Roll {
                    dice: vec![DieOutcome {
                        value: appended,
                        critical: false,
                        complication: false,
                    }],
                    sides: 1,
                    timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(u64::from(at_secs)),
                    roller: Participant::player("fuzz", "fuzz", "0.0.0.x"),
                });
                appended += 1;
            },
            Op::Threat(value) => table.set_threat(value),
            Op::Momentum(value) => table.set_momentum(value),
            Op::SceneTraits(traits) => table.set_scene_traits(traits),
            Op::CharacterTraits { name, traits } => {
                table.set_character_traits(format!("crew-{}", name % 8), traits);
            },
            Op::Update { threat, momentum } => {
                let stats = table.apply(StatsUpdate {
                    threat,
                    momentum,
                    ..StatsUpdate::default()
                });
                if let Some(threat) = threat {
                    assert_eq!(stats.threat, threat);
                }
            },
            Op::Register => subscriptions.push(hub.register()),
            Op::Unregister { slot } => {
                if !subscriptions.is_empty() {
                    let index = usize::from(slot) % subscriptions.len();
                    drop(subscriptions.swap_remove(index));
                }
            },
            Op::Drain { slot } => {
                if !subscriptions.is_empty() {
                    let index = usize::from(slot) % subscriptions.len();
                    while subscriptions[index].try_recv().is_some() {}
                }
            },
            Op::Publish { stats } => {
                let kind = if stats { EventKind::Stats } else { EventKind::Roll };
                let report = hub.publish(kind, &table);
                assert!(report.rendered);
                assert_eq!(report.delivered + report.skipped, subscriptions.len());
            },
        }

        assert_eq!(hub.observer_count(), subscriptions.len());
    }

    let history = table.sorted_rolls();
    assert_eq!(history.len() as i64, appended);
    for pair in history.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
        if pair[0].timestamp == pair[1].timestamp {
            assert!(pair[0].dice[0].value > pair[1].dice[0].value);
        }
    }

    assert!(table.stats().character_traits.values().all(|traits| !traits.is_empty()));
});
