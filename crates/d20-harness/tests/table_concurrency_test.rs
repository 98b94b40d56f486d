//! Table state ordering and concurrency tests
//!
//! The ledger must come back newest-first whatever order appends land in,
//! must never lose or duplicate an entry under concurrent writers, and stats
//! updates must never be observed half-applied.

use std::{
    collections::HashSet,
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};

use d20_core::{DieOutcome, Roll, StatsUpdate, TableState};
use d20_harness::player;
use proptest::prelude::*;

/// A roll whose single die value doubles as a unique marker.
fn marked_roll(marker: i64, at_micros: u64) -> Roll {
    Roll {
        dice: vec![DieOutcome { value: marker, critical: false, complication: false }],
        sides: i64::MAX,
        timestamp: SystemTime::UNIX_EPOCH + Duration::from_micros(at_micros),
        roller: player("Ana"),
    }
}

fn markers(rolls: &[Roll]) -> Vec<i64> {
    rolls.iter().map(|r| r.dice[0].value).collect()
}

#[test]
fn prop_history_newest_first_for_any_append_order() {
    proptest!(|(order in Just(vec![1u64, 2, 3]).prop_shuffle())| {
        let table = TableState::new();
        for t in &order {
            table.append_roll(marked_roll(*t as i64, *t));
        }

        prop_assert_eq!(markers(&table.sorted_rolls()), vec![3, 2, 1]);
    });
}

#[test]
fn prop_history_sorted_for_arbitrary_timestamps() {
    proptest!(|(stamps in prop::collection::vec(0u64..10_000, 0..64))| {
        let table = TableState::new();
        for (i, t) in stamps.iter().enumerate() {
            table.append_roll(marked_roll(i as i64, *t));
        }

        let sorted = table.sorted_rolls();
        prop_assert_eq!(sorted.len(), stamps.len());
        for pair in sorted.windows(2) {
            prop_assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    });
}

#[test]
fn concurrent_appends_then_reads_lose_nothing() {
    const WRITERS: usize = 1000;
    const READERS: usize = 1000;

    let table = Arc::new(TableState::new());

    thread::scope(|s| {
        for i in 0..WRITERS {
            let table = Arc::clone(&table);
            s.spawn(move || table.append_roll(marked_roll(i as i64, (i as u64 * 7919) % 1000)));
        }
    });

    let snapshots: Vec<Vec<Roll>> = thread::scope(|s| {
        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                let table = Arc::clone(&table);
                s.spawn(move || table.sorted_rolls())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for snapshot in snapshots {
        assert_eq!(snapshot.len(), WRITERS);

        let unique: HashSet<i64> = markers(&snapshot).into_iter().collect();
        assert_eq!(unique.len(), WRITERS, "duplicate entry in snapshot");

        for roll in &snapshot {
            assert_eq!(roll.dice.len(), 1);
            assert_eq!(roll.roller, player("Ana"));
        }
        for pair in snapshot.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }
}

#[test]
fn readers_during_appends_see_only_whole_prefixes() {
    const WRITES: usize = 500;

    let table = Arc::new(TableState::new());

    thread::scope(|s| {
        let writer = Arc::clone(&table);
        s.spawn(move || {
            for i in 0..WRITES {
                writer.append_roll(marked_roll(i as i64, i as u64));
            }
        });

        for _ in 0..8 {
            let reader = Arc::clone(&table);
            s.spawn(move || {
                let mut last_len = 0;
                for _ in 0..200 {
                    let snapshot = reader.sorted_rolls();
                    assert!(snapshot.len() >= last_len, "history shrank");
                    last_len = snapshot.len();

                    // Appends happen in timestamp order, so a snapshot is
                    // always exactly the newest-first prefix.
                    let expected: Vec<i64> = (0..snapshot.len() as i64).rev().collect();
                    assert_eq!(markers(&snapshot), expected);
                }
            });
        }
    });

    assert_eq!(table.roll_count(), WRITES);
}

#[test]
fn concurrent_stats_updates_never_tear() {
    let table = Arc::new(TableState::new());

    thread::scope(|s| {
        for k in 0..64i64 {
            let table = Arc::clone(&table);
            s.spawn(move || {
                for _ in 0..50 {
                    table.apply(StatsUpdate {
                        threat: Some(k),
                        momentum: Some(k),
                        scene_traits: Some(vec![k.to_string()]),
                        character_traits: None,
                    });
                }
            });
        }

        for _ in 0..8 {
            let table = Arc::clone(&table);
            s.spawn(move || {
                for _ in 0..500 {
                    let stats = table.stats();
                    assert_eq!(stats.threat, stats.momentum);
                    if stats.threat != 0 || !stats.scene_traits.is_empty() {
                        assert_eq!(stats.scene_traits, vec![stats.threat.to_string()]);
                    }
                }
            });
        }
    });
}

#[test]
fn concurrent_character_trait_writers_leave_sparse_map() {
    let table = Arc::new(TableState::new());

    thread::scope(|s| {
        for i in 0..32 {
            let table = Arc::clone(&table);
            s.spawn(move || {
                let name = format!("crew-{i}");
                table.set_character_traits(name.clone(), vec!["brave".to_string()]);
                if i % 2 == 0 {
                    table.set_character_traits(name, vec![]);
                }
            });
        }
    });

    let stats = table.stats();
    assert_eq!(stats.character_traits.len(), 16);
    assert!(stats.character_traits.values().all(|traits| !traits.is_empty()));
}

#[test]
fn data_trait_scenario() {
    let table = TableState::new();
    table.set_character_traits("Data", vec!["android".to_string()]);
    table.set_character_traits("Data", vec![]);

    assert!(!table.stats().character_traits.contains_key("Data"));
}
