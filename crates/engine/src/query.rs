//! Plan execution against the store.
//!
//! Candidates come from the plan's driver; each is resolved through the
//! primary table and checked against the residual filter. Ids the primary
//! table no longer knows are skipped silently and counted — readers must
//! tolerate index entries for events that are mid-insert or mid-delete.
//!
//! Deadlines are checked between candidates; an exceeded deadline aborts
//! the scan with `Timeout` and never returns partial results.

use std::sync::Arc;
use std::time::Instant;

use tracebase_core::{TraceError, TraceEvent, TraceResult};

use crate::planner::{IndexDriver, Order, Plan, QueryFilter};
use crate::store::EventStore;

/// Candidates processed between deadline checks.
const DEADLINE_CHECK_EVERY: usize = 64;

/// Run a plan. Results are bounded by `plan.limit`; ordering follows the
/// plan (see module docs of `planner`).
pub fn execute(
    store: &EventStore,
    plan: &Plan,
    deadline: Option<Instant>,
) -> TraceResult<Vec<Arc<TraceEvent>>> {
    let started = Instant::now();

    match &plan.driver {
        IndexDriver::Temporal { since, until } => {
            let ids = temporal_candidates(store, *since, *until, plan.order);
            collect(store, ids.iter().map(String::as_str), &plan.residual, plan.limit, deadline, started)
        }
        IndexDriver::FullScan => {
            store.stats.note_full_scan();
            let mut checked = 0usize;
            let mut out = Vec::new();
            for entry in store.primary.iter() {
                checked += 1;
                if checked % DEADLINE_CHECK_EVERY == 0 {
                    check_deadline(deadline, started)?;
                }
                if plan.residual.matches(entry.value()) {
                    out.push(Arc::clone(entry.value()));
                }
            }
            // DashMap iteration order is arbitrary; sort for determinism.
            sort_events(&mut out, plan.order.unwrap_or(Order::Asc));
            out.truncate(plan.limit);
            Ok(out)
        }
        IndexDriver::Correlation(corr) => {
            indexed(store, store.scan_by_correlation(corr), plan, deadline, started)
        }
        IndexDriver::AstNode(node) => {
            indexed(store, store.scan_by_ast_node(node), plan, deadline, started)
        }
        IndexDriver::Function(key) => {
            indexed(store, store.scan_by_function(key), plan, deadline, started)
        }
        IndexDriver::Process(pid) => {
            indexed(store, store.scan_by_process(pid), plan, deadline, started)
        }
    }
}

/// Point-keyed index drivers: append order unless the caller asked for a
/// timestamp order, in which case everything is resolved first and sorted.
fn indexed(
    store: &EventStore,
    ids: Vec<String>,
    plan: &Plan,
    deadline: Option<Instant>,
    started: Instant,
) -> TraceResult<Vec<Arc<TraceEvent>>> {
    match plan.order {
        // No explicit order: keep the index's append order and
        // short-circuit at the limit.
        None => collect(
            store,
            ids.iter().map(String::as_str),
            &plan.residual,
            plan.limit,
            deadline,
            started,
        ),
        Some(order) => {
            let mut out = collect(
                store,
                ids.iter().map(String::as_str),
                &plan.residual,
                usize::MAX,
                deadline,
                started,
            )?;
            sort_events(&mut out, order);
            out.truncate(plan.limit);
            Ok(out)
        }
    }
}

/// Ids in the requested timestamp order with deterministic lexicographic
/// tie-break within equal timestamps. The temporal lock is released before
/// any primary lookup happens.
fn temporal_candidates(store: &EventStore, since: u64, until: u64, order: Option<Order>) -> Vec<String> {
    if since > until {
        return Vec::new();
    }
    let mut buckets: Vec<Vec<String>> = {
        let temporal = store.temporal.read().unwrap();
        temporal.range(since..=until).map(|(_, ids)| ids.clone()).collect()
    };
    for ids in &mut buckets {
        ids.sort_unstable();
    }
    match order {
        Some(Order::Desc) => buckets
            .into_iter()
            .rev()
            .flat_map(|ids| ids.into_iter().rev())
            .collect(),
        _ => buckets.into_iter().flatten().collect(),
    }
}

fn collect<'a>(
    store: &EventStore,
    ids: impl Iterator<Item = &'a str>,
    residual: &QueryFilter,
    limit: usize,
    deadline: Option<Instant>,
    started: Instant,
) -> TraceResult<Vec<Arc<TraceEvent>>> {
    let mut out = Vec::new();
    for (i, id) in ids.enumerate() {
        if i % DEADLINE_CHECK_EVERY == 0 {
            check_deadline(deadline, started)?;
        }
        match store.lookup(id) {
            Some(event) => {
                if residual.matches(&event) {
                    out.push(event);
                    if out.len() >= limit {
                        break;
                    }
                }
            }
            None => {
                // Mid-insert or mid-delete; treat as absent.
                store.stats.note_stale_index_hit();
                tracing::trace!(event_id = %id, "index entry has no primary record, skipped");
            }
        }
    }
    Ok(out)
}

fn sort_events(events: &mut [Arc<TraceEvent>], order: Order) {
    events.sort_by(|a, b| {
        let key = a
            .timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.event_id.cmp(&b.event_id));
        match order {
            Order::Asc => key,
            Order::Desc => key.reverse(),
        }
    });
}

fn check_deadline(deadline: Option<Instant>, started: Instant) -> TraceResult<()> {
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return Err(TraceError::timeout(started.elapsed().as_millis() as u64));
        }
    }
    Ok(())
}
