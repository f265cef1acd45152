//! Store statistics: atomic counters plus a serializable snapshot.
//!
//! Counters reflect the observable state after each completed write or
//! prune batch; no consistency with in-flight operations is promised.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel for "no oldest timestamp recorded".
const UNSET_OLDEST: u64 = u64::MAX;

/// Live counters, updated under the writer gate for mutations and read
/// lock-free by `snapshot`.
#[derive(Debug, Default)]
pub struct StoreStats {
    total_events: AtomicU64,
    inserted_total: AtomicU64,
    deleted_total: AtomicU64,
    prune_runs: AtomicU64,
    full_scan_count: AtomicU64,
    stale_index_hits: AtomicU64,
    memory_bytes: AtomicU64,
    oldest_timestamp: AtomicU64,
    newest_timestamp: AtomicU64,
}

impl StoreStats {
    pub fn new() -> Self {
        let stats = Self::default();
        stats.oldest_timestamp.store(UNSET_OLDEST, Ordering::Relaxed);
        stats
    }

    pub fn record_insert(&self, timestamp: u64, bytes: usize) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        self.inserted_total.fetch_add(1, Ordering::Relaxed);
        self.memory_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.oldest_timestamp.fetch_min(timestamp, Ordering::Relaxed);
        self.newest_timestamp.fetch_max(timestamp, Ordering::Relaxed);
    }

    pub fn record_delete(&self, bytes: usize) {
        self.total_events.fetch_sub(1, Ordering::Relaxed);
        self.deleted_total.fetch_add(1, Ordering::Relaxed);
        // Saturating: the estimate may drift, never let it wrap.
        let _ = self
            .memory_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(bytes as u64))
            });
    }

    /// Re-anchor the timestamp watermarks after a delete or prune, from the
    /// temporal table's current extremes.
    pub fn set_bounds(&self, oldest: Option<u64>, newest: Option<u64>) {
        self.oldest_timestamp
            .store(oldest.unwrap_or(UNSET_OLDEST), Ordering::Relaxed);
        self.newest_timestamp.store(newest.unwrap_or(0), Ordering::Relaxed);
    }

    pub fn note_prune_run(&self) {
        self.prune_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_full_scan(&self) {
        self.full_scan_count.fetch_add(1, Ordering::Relaxed);
    }

    /// A reader found an index entry whose id is absent from the primary
    /// table and skipped it.
    pub fn note_stale_index_hit(&self) {
        self.stale_index_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_events(&self) -> usize {
        self.total_events.load(Ordering::Relaxed) as usize
    }

    pub fn reset(&self) {
        self.total_events.store(0, Ordering::Relaxed);
        self.memory_bytes.store(0, Ordering::Relaxed);
        self.oldest_timestamp.store(UNSET_OLDEST, Ordering::Relaxed);
        self.newest_timestamp.store(0, Ordering::Relaxed);
        // Cumulative counters (inserted/deleted/prunes/scans) survive a
        // clear; they describe the instance lifetime, not its contents.
    }

    pub fn snapshot(&self, index_sizes: IndexSizes) -> StatsSnapshot {
        let total = self.total_events.load(Ordering::Relaxed);
        let oldest = self.oldest_timestamp.load(Ordering::Relaxed);
        StatsSnapshot {
            total_events: total,
            memory_bytes_estimate: self.memory_bytes.load(Ordering::Relaxed),
            oldest_timestamp: if oldest == UNSET_OLDEST { None } else { Some(oldest) },
            newest_timestamp: if total == 0 {
                None
            } else {
                Some(self.newest_timestamp.load(Ordering::Relaxed))
            },
            inserted_total: self.inserted_total.load(Ordering::Relaxed),
            deleted_total: self.deleted_total.load(Ordering::Relaxed),
            prune_runs: self.prune_runs.load(Ordering::Relaxed),
            full_scan_count: self.full_scan_count.load(Ordering::Relaxed),
            stale_index_hits: self.stale_index_hits.load(Ordering::Relaxed),
            index_sizes,
        }
    }
}

/// Distinct-key count per secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSizes {
    pub temporal: usize,
    pub process: usize,
    pub function: usize,
    pub correlation: usize,
    pub ast_node: usize,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_events: u64,
    pub memory_bytes_estimate: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_timestamp: Option<u64>,
    pub inserted_total: u64,
    pub deleted_total: u64,
    pub prune_runs: u64,
    pub full_scan_count: u64,
    pub stale_index_hits: u64,
    pub index_sizes: IndexSizes,
}
