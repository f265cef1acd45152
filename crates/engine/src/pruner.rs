//! Bounded-memory pruning: capacity and age enforcement.
//!
//! Eviction is always oldest-first by timestamp. A capacity prune drops the
//! store to the low-water target so steady-state ingest does not prune on
//! every insert. The pruner holds no table state of its own; it drives the
//! store's delete paths, which release the writer gate between chunks.

use chrono::Utc;
use tracebase_core::{TraceError, TraceResult};

use crate::store::EventStore;

/// Wall clock in unix milliseconds, the epoch event timestamps share.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Capacity and age policy, derived from the start-up config.
#[derive(Debug, Clone)]
pub struct Pruner {
    max_events: usize,
    /// `floor(max_events * low_water_ratio)`.
    low_water_target: usize,
    max_age_ms: Option<u64>,
}

impl Pruner {
    pub fn new(max_events: usize, low_water_ratio: f64, max_age_ms: Option<u64>) -> Self {
        let low_water_target = (max_events as f64 * low_water_ratio).floor() as usize;
        Self {
            max_events,
            low_water_target,
            max_age_ms,
        }
    }

    /// Make room for `incoming` events, evicting oldest-first down to the
    /// low-water target. Fails with `CapacityExceeded` only when no amount
    /// of eviction can fit the incoming events.
    pub fn ensure_capacity(&self, store: &EventStore, incoming: usize) -> TraceResult<()> {
        let total = store.len();
        if total + incoming <= self.max_events {
            return Ok(());
        }
        if incoming > self.max_events {
            return Err(TraceError::capacity_exceeded(self.max_events));
        }

        let to_target = total.saturating_sub(self.low_water_target);
        let to_fit = (total + incoming).saturating_sub(self.max_events);
        let removed = store.evict_oldest(to_target.max(to_fit));
        store.stats.note_prune_run();
        tracing::debug!(removed, total_before = total, incoming, "capacity prune");

        if store.len() + incoming > self.max_events {
            return Err(TraceError::capacity_exceeded(self.max_events));
        }
        Ok(())
    }

    /// Age-based prune relative to `now_ms`; a no-op unless `max_age_ms`
    /// is configured. Returns the number removed.
    pub fn prune_aged(&self, store: &EventStore, now_ms: u64) -> usize {
        let Some(max_age) = self.max_age_ms else {
            return 0;
        };
        let cutoff = now_ms.saturating_sub(max_age);
        let removed = store.delete_before(cutoff);
        if removed > 0 {
            store.stats.note_prune_run();
            tracing::info!(removed, cutoff, "aged events pruned");
        }
        removed
    }

    /// Explicit cleanup: remove everything strictly older than `cutoff`.
    pub fn cleanup(&self, store: &EventStore, cutoff: u64) -> usize {
        let removed = store.delete_before(cutoff);
        store.stats.note_prune_run();
        tracing::info!(removed, cutoff, "explicit cleanup");
        removed
    }
}
