//! Property-based tests for the live window and the coordinator scenarios.
//!
//! - the window stays sorted newest first and never holds a record twice
//! - a batch insert emits exactly one reset
//! - capacity, threshold and activity changes keep the window consistent

use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use proptest::prelude::*;

use logpane_types::{ArcRecord, RecordBuilder, Severity};
use logpane_view::{Coordinator, LiveWindow, SearchCriteria, ViewSettings, WindowChange};

// =============================================================================
// Helpers
// =============================================================================

fn record_at(ms: i64, application: &str, severity: Severity) -> ArcRecord {
    let ts = FixedOffset::east_opt(0)
        .unwrap()
        .timestamp_millis_opt(ms)
        .unwrap();
    Arc::new(
        RecordBuilder::new(ts)
            .application(application)
            .namespace("App.Ns")
            .severity(severity)
            .message(format!("{severity} at {ms}"))
            .build(),
    )
}

#[derive(Clone, Debug)]
enum Op {
    Add(usize),
    AddLeading(usize),
    AddMany(Vec<usize>),
    Remove(usize),
    RemoveMany(Vec<usize>),
}

fn arb_op(pool: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..pool).prop_map(Op::Add),
        (0..pool).prop_map(Op::AddLeading),
        prop::collection::vec(0..pool, 0..8).prop_map(Op::AddMany),
        (0..pool).prop_map(Op::Remove),
        prop::collection::vec(0..pool, 0..8).prop_map(Op::RemoveMany),
    ]
}

fn assert_window_order_and_uniqueness(window: &LiveWindow) {
    let records: Vec<_> = window.iter().collect();
    for pair in records.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp, "window out of order");
    }
    for (i, a) in records.iter().enumerate() {
        for b in &records[i + 1..] {
            assert!(!Arc::ptr_eq(a, b), "record shown twice");
        }
    }
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<WindowChange>) -> Vec<WindowChange> {
    let mut changes = Vec::new();
    while let Ok(change) = rx.try_recv() {
        changes.push(change);
    }
    changes
}

// =============================================================================
// Window properties
// =============================================================================

proptest! {
    #[test]
    fn window_stays_sorted_and_unique(
        times in prop::collection::vec(0i64..50, 1..24),
        ops in prop::collection::vec(arb_op(24), 0..64),
    ) {
        let pool: Vec<_> = times.iter().map(|&ms| record_at(ms, "App", Severity::Info)).collect();
        let mut window = LiveWindow::new();

        for op in ops {
            match op {
                Op::Add(i) => { window.add(Arc::clone(&pool[i % pool.len()])); }
                Op::AddLeading(i) => { window.add_leading(Arc::clone(&pool[i % pool.len()])); }
                Op::AddMany(ix) => {
                    window.add_many(ix.iter().map(|i| &pool[i % pool.len()]), |_| true);
                }
                Op::Remove(i) => { window.remove(&pool[i % pool.len()]); }
                Op::RemoveMany(ix) => {
                    window.remove_all(ix.iter().map(|i| &pool[i % pool.len()]));
                }
            }
            assert_window_order_and_uniqueness(&window);
        }
    }

    #[test]
    fn add_many_emits_one_reset(times in prop::collection::vec(0i64..1_000, 1..40)) {
        let batch: Vec<_> = times.iter().map(|&ms| record_at(ms, "App", Severity::Debug)).collect();
        let mut window = LiveWindow::new();
        let mut rx = window.subscribe();

        let inserted = window.add_many(&batch, |_| true);
        prop_assert_eq!(inserted, batch.len());

        let changes = drain(&mut rx);
        prop_assert_eq!(changes.len(), 1);
        prop_assert!(matches!(changes[0], WindowChange::Reset));
    }

    #[test]
    fn tick_output_is_sorted(times in prop::collection::vec(0i64..10_000, 1..60)) {
        let coordinator = Coordinator::new(ViewSettings::default());
        for &ms in &times {
            coordinator.enqueue(record_at(ms, "App", Severity::Warn));
        }
        coordinator.tick();

        let visible = coordinator.visible();
        prop_assert_eq!(visible.len(), times.len());
        prop_assert!(visible.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }
}

// =============================================================================
// Scenarios
// =============================================================================

fn one_per_level(coordinator: &Coordinator) {
    for (ms, level) in Severity::all().enumerate() {
        coordinator.enqueue(record_at(ms as i64, "App", level));
    }
    coordinator.tick();
}

fn visible_levels(coordinator: &Coordinator) -> Vec<Severity> {
    let mut levels: Vec<_> = coordinator.visible().iter().map(|r| r.severity).collect();
    levels.sort();
    levels
}

#[test]
fn capacity_one_keeps_most_recent_trace() {
    let coordinator = Coordinator::new(ViewSettings {
        max_per_level: 1,
        ..Default::default()
    });
    coordinator.enqueue(record_at(1, "App", Severity::Trace));
    coordinator.enqueue(record_at(2, "App", Severity::Trace));
    coordinator.tick();

    let visible = coordinator.visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].timestamp.timestamp_millis(), 2);
    assert_eq!(coordinator.applications()[0].buffered, 1);
}

#[test]
fn raising_threshold_to_error_hides_lower_levels() {
    let coordinator = Coordinator::new(ViewSettings::default());
    one_per_level(&coordinator);
    assert_eq!(coordinator.visible_len(), 6);

    coordinator.set_threshold("App", Severity::Error).unwrap();
    assert_eq!(visible_levels(&coordinator), vec![Severity::Error, Severity::Fatal]);
}

#[test]
fn toggling_active_restores_all_levels_in_order() {
    let coordinator = Coordinator::new(ViewSettings::default());
    one_per_level(&coordinator);

    coordinator.set_active("App", false).unwrap();
    assert_eq!(coordinator.visible_len(), 0);

    coordinator.set_active("App", true).unwrap();
    let times: Vec<_> = coordinator
        .visible()
        .iter()
        .map(|r| r.timestamp.timestamp_millis())
        .collect();
    assert_eq!(times, vec![5, 4, 3, 2, 1, 0]);
}

#[test]
fn shrinking_capacity_everywhere_trims_window() {
    let coordinator = Coordinator::new(ViewSettings::default());
    for ms in 0..5 {
        coordinator.enqueue(record_at(ms, "A", Severity::Info));
        coordinator.enqueue(record_at(ms, "B", Severity::Info));
    }
    coordinator.tick();
    assert_eq!(coordinator.visible_len(), 10);

    coordinator.set_max_per_level_all(2);
    assert_eq!(coordinator.visible_len(), 4);
    assert!(coordinator.visible().iter().all(|r| r.timestamp.timestamp_millis() >= 3));
}

#[test]
fn search_applies_to_later_applications() {
    let coordinator = Coordinator::new(ViewSettings::default());
    coordinator.set_search(SearchCriteria::new("fatal"));

    one_per_level(&coordinator);
    assert_eq!(visible_levels(&coordinator), vec![Severity::Fatal]);
}
