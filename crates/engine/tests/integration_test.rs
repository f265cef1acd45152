//! Engine integration tests
//!
//! These exercise the store, planner, query executor, and pruner together:
//! - every index answers for a freshly inserted event
//! - cleanup makes old events unreachable through every path
//! - stats reflect completed writes and prunes
//! - concurrent readers never observe half-inserted events

use std::sync::Arc;

use tracebase_core::{Pid, TraceEvent};
use tracebase_engine::{execute, plan, EventStore, Order, Pruner, QueryFilter};

fn event(id: &str, ts: u64, pid: &str) -> TraceEvent {
    TraceEvent::new(id, ts, Pid::new(pid), "shop", "checkout", 1, "call")
}

fn query(store: &EventStore, filter: QueryFilter) -> Vec<String> {
    let plan = plan(&filter, 1_000).unwrap();
    execute(store, &plan, None)
        .unwrap()
        .iter()
        .map(|e| e.event_id.clone())
        .collect()
}

#[test]
fn single_event_reachable_through_every_index_it_populates() {
    let store = EventStore::new();
    store
        .insert(
            event("e1", 500, "p9")
                .with_correlation("corr-7")
                .with_ast_node("node-3"),
        )
        .unwrap();

    assert_eq!(query(&store, QueryFilter::default().with_pid(Pid::new("p9"))), vec!["e1"]);
    assert_eq!(
        query(&store, QueryFilter::default().with_function("shop", "checkout", 1)),
        vec!["e1"]
    );
    assert_eq!(
        query(&store, QueryFilter::default().with_correlation_id("corr-7")),
        vec!["e1"]
    );
    assert_eq!(
        query(&store, QueryFilter::default().with_ast_node_id("node-3")),
        vec!["e1"]
    );
    assert_eq!(
        query(&store, QueryFilter::default().with_since(500).with_until(500)),
        vec!["e1"]
    );
    assert_eq!(query(&store, QueryFilter::default()), vec!["e1"]);
}

#[test]
fn cleanup_makes_events_unreachable_everywhere() {
    let store = EventStore::new();
    let pruner = Pruner::new(1_000, 0.9, None);

    store
        .insert(event("old", 100, "p1").with_correlation("c1").with_ast_node("n1"))
        .unwrap();
    store
        .insert(event("new", 900, "p1").with_correlation("c1").with_ast_node("n1"))
        .unwrap();

    assert_eq!(pruner.cleanup(&store, 500), 1);

    assert!(store.lookup("old").is_none());
    for filter in [
        QueryFilter::default(),
        QueryFilter::default().with_pid(Pid::new("p1")),
        QueryFilter::default().with_correlation_id("c1"),
        QueryFilter::default().with_ast_node_id("n1"),
        QueryFilter::default().with_function("shop", "checkout", 1),
        QueryFilter::default().with_until(u64::MAX),
    ] {
        assert_eq!(query(&store, filter), vec!["new"]);
    }
}

#[test]
fn capacity_prune_then_query_sees_survivors_only() {
    let store = EventStore::new();
    let pruner = Pruner::new(2, 0.9, None);

    for (id, ts) in [("a", 100), ("b", 200), ("c", 300)] {
        pruner.ensure_capacity(&store, 1).unwrap();
        store.insert(event(id, ts, "p1")).unwrap();
    }

    let snap = store.snapshot_stats();
    assert!(snap.total_events <= 2);
    assert!(store.lookup("a").is_none());

    let ids = query(&store, QueryFilter::default());
    assert!(ids.contains(&"c".to_string()));
    assert!(!ids.contains(&"a".to_string()));
}

#[test]
fn stats_follow_write_and_prune_batches() {
    let store = EventStore::new();
    let pruner = Pruner::new(1_000, 0.9, Some(1_000));

    let outcome = store
        .insert_batch((0..10).map(|i| event(&format!("e{i}"), 1_000 + i, "p1")).collect())
        .unwrap();
    assert_eq!(outcome.inserted, 10);

    let snap = store.snapshot_stats();
    assert_eq!(snap.total_events, 10);
    assert_eq!(snap.inserted_total, 10);
    assert_eq!(snap.oldest_timestamp, Some(1_000));
    assert_eq!(snap.newest_timestamp, Some(1_009));
    assert!(snap.memory_bytes_estimate > 0);
    assert_eq!(snap.index_sizes.process, 1);
    assert_eq!(snap.index_sizes.temporal, 10);

    // now=2_005 → cutoff=1_005 → e0..e4 go
    assert_eq!(pruner.prune_aged(&store, 2_005), 5);
    let snap = store.snapshot_stats();
    assert_eq!(snap.total_events, 5);
    assert_eq!(snap.deleted_total, 5);
    assert_eq!(snap.oldest_timestamp, Some(1_005));
    assert_eq!(snap.prune_runs, 1);
}

#[test]
fn ordering_is_stable_across_drivers() {
    let store = EventStore::new();
    // Two pids, interleaved timestamps, one shared correlation
    store.insert(event("e3", 300, "p1").with_correlation("c")).unwrap();
    store.insert(event("e1", 100, "p2").with_correlation("c")).unwrap();
    store.insert(event("e2", 200, "p1").with_correlation("c")).unwrap();

    // Explicit asc sorts by timestamp regardless of driver
    let by_corr = query(
        &store,
        QueryFilter::default().with_correlation_id("c").with_order(Order::Asc),
    );
    let by_scan = query(&store, QueryFilter::default().with_order(Order::Asc));
    assert_eq!(by_corr, vec!["e1", "e2", "e3"]);
    assert_eq!(by_corr, by_scan);

    // Without an order the correlation index reports insertion order
    assert_eq!(
        query(&store, QueryFilter::default().with_correlation_id("c")),
        vec!["e3", "e1", "e2"]
    );
}

#[test]
fn concurrent_readers_never_see_half_inserted_events() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    let store = Arc::new(EventStore::new());
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    // execute() skips ids whose primary record is not yet
                    // (or no longer) present, so every returned event must
                    // be fully resolved and match the filter.
                    let filter = QueryFilter::default().with_pid(Pid::new("p1"));
                    let plan = plan(&filter, usize::MAX).unwrap();
                    let events = execute(&store, &plan, None).unwrap();
                    for ev in events {
                        assert_eq!(ev.pid, Pid::new("p1"));
                    }
                }
            })
        })
        .collect();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..2_000u64 {
                store
                    .insert(event(&format!("e{i}"), i, "p1").with_correlation("c1"))
                    .unwrap();
                if i % 3 == 0 {
                    store.delete(&format!("e{i}")).unwrap();
                }
            }
        })
    };

    writer.join().unwrap();
    stop.store(true, Ordering::Relaxed);
    for r in readers {
        r.join().unwrap();
    }

    // Writer deleted every third event (i = 0, 3, ..., 1998)
    let snap = store.snapshot_stats();
    assert_eq!(snap.total_events, 2_000 - 667);
}
