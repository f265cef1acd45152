//! The indexed event store: one primary table plus five secondary indexes.
//!
//! # Write discipline
//!
//! All mutations serialize through a single writer gate; readers never take
//! it. Inserts write `primary` first, then the indexes, so a concurrent
//! query can never resolve an index entry to a missing record for an event
//! that is still being inserted. Deletes run the reverse order: indexes
//! first, `primary` last. Readers that find an index id with no primary
//! match treat the event as absent (it is either not yet fully inserted or
//! already on its way out) and skip it silently.
//!
//! Batch deletions release the gate between chunks so queries and lookups
//! interleave with long prunes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use tracebase_core::{FunctionKey, Pid, TraceError, TraceEvent, TraceResult};

use crate::stats::{IndexSizes, StatsSnapshot, StoreStats};

/// Sharded map with the fast non-cryptographic hash; keys are process-local.
pub(crate) type FxDashMap<K, V> = DashMap<K, V, FxBuildHasher>;

/// Upper bound on deletions performed per gate acquisition.
const DELETE_CHUNK: usize = 256;

/// Outcome of a batch insert. Duplicate ids are skipped and accumulated;
/// already-inserted events survive a later hard error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub skipped_ids: Vec<String>,
}

/// In-memory event store.
///
/// The primary table owns each event behind an `Arc`; the indexes hold ids
/// only. Point-keyed indexes are sharded maps read lock-free; the temporal
/// index is an ordered map behind an `RwLock` for range scans.
pub struct EventStore {
    pub(crate) primary: FxDashMap<String, Arc<TraceEvent>>,
    pub(crate) temporal: RwLock<BTreeMap<u64, Vec<String>>>,
    pub(crate) process: FxDashMap<Pid, Vec<String>>,
    pub(crate) function: FxDashMap<FunctionKey, Vec<String>>,
    pub(crate) correlation: FxDashMap<String, Vec<String>>,
    pub(crate) ast_node: FxDashMap<String, Vec<String>>,
    pub(crate) stats: StoreStats,
    write_gate: Mutex<()>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            primary: FxDashMap::default(),
            temporal: RwLock::new(BTreeMap::new()),
            process: FxDashMap::default(),
            function: FxDashMap::default(),
            correlation: FxDashMap::default(),
            ast_node: FxDashMap::default(),
            stats: StoreStats::new(),
            write_gate: Mutex::new(()),
        }
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a single event.
    ///
    /// Fails with `DuplicateId` when the id is already present; the store
    /// is unchanged in that case.
    pub fn insert(&self, event: TraceEvent) -> TraceResult<()> {
        let _gate = self.write_gate.lock().unwrap();
        self.insert_locked(event)
    }

    /// Insert a batch, skipping duplicates.
    ///
    /// The gate is re-acquired per element so readers interleave with large
    /// batches.
    pub fn insert_batch(&self, events: Vec<TraceEvent>) -> TraceResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for event in events {
            let id = event.event_id.clone();
            match self.insert(event) {
                Ok(()) => outcome.inserted += 1,
                Err(TraceError::DuplicateId { .. }) => outcome.skipped_ids.push(id),
                Err(other) => return Err(other),
            }
        }
        Ok(outcome)
    }

    fn insert_locked(&self, event: TraceEvent) -> TraceResult<()> {
        if self.primary.contains_key(&event.event_id) {
            return Err(TraceError::duplicate_id(&event.event_id));
        }

        let bytes = event.estimated_size();
        let timestamp = event.timestamp;
        let id = event.event_id.clone();
        let event = Arc::new(event);

        // Primary first: an id visible in an index always resolves.
        self.primary.insert(id.clone(), Arc::clone(&event));

        self.temporal
            .write()
            .unwrap()
            .entry(timestamp)
            .or_default()
            .push(id.clone());
        self.process
            .entry(event.pid.clone())
            .or_default()
            .push(id.clone());
        self.function
            .entry(event.function_key())
            .or_default()
            .push(id.clone());
        if let Some(corr) = &event.correlation_id {
            self.correlation
                .entry(corr.clone())
                .or_default()
                .push(id.clone());
        }
        if let Some(node) = &event.ast_node_id {
            self.ast_node.entry(node.clone()).or_default().push(id);
        }

        self.stats.record_insert(timestamp, bytes);
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up an event by id. Lock-free.
    pub fn lookup(&self, event_id: &str) -> Option<Arc<TraceEvent>> {
        self.primary.get(event_id).map(|e| Arc::clone(e.value()))
    }

    /// Ids of events with `since <= timestamp <= until`, ascending by
    /// timestamp, append order within one timestamp.
    pub fn scan_temporal(&self, since: u64, until: u64) -> Vec<String> {
        if since > until {
            return Vec::new();
        }
        self.temporal
            .read()
            .unwrap()
            .range(since..=until)
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    /// Ids recorded for a process, in append order.
    pub fn scan_by_process(&self, pid: &Pid) -> Vec<String> {
        self.process.get(pid).map(|e| e.value().clone()).unwrap_or_default()
    }

    /// Ids recorded for a `(module, function, arity)` key, in append order.
    pub fn scan_by_function(&self, key: &FunctionKey) -> Vec<String> {
        self.function.get(key).map(|e| e.value().clone()).unwrap_or_default()
    }

    /// Ids recorded for a correlation id, in append order.
    pub fn scan_by_correlation(&self, correlation_id: &str) -> Vec<String> {
        self.correlation
            .get(correlation_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Ids recorded for an AST node id, in append order.
    pub fn scan_by_ast_node(&self, ast_node_id: &str) -> Vec<String> {
        self.ast_node
            .get(ast_node_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Deletes
    // =========================================================================

    /// Delete one event, removing it from every index it participated in.
    pub fn delete(&self, event_id: &str) -> TraceResult<()> {
        let _gate = self.write_gate.lock().unwrap();
        self.delete_locked(event_id)?;
        self.refresh_bounds();
        Ok(())
    }

    /// Delete every event with `timestamp < cutoff`, oldest first.
    /// Returns the number removed.
    pub fn delete_before(&self, cutoff: u64) -> usize {
        let mut removed = 0;
        loop {
            let n = self.delete_oldest_chunk(Some(cutoff), DELETE_CHUNK);
            removed += n;
            if n < DELETE_CHUNK {
                break;
            }
        }
        removed
    }

    /// Delete up to `count` events in ascending timestamp order.
    /// Returns the number removed (less than `count` only when the store
    /// ran out of events).
    pub fn evict_oldest(&self, count: usize) -> usize {
        let mut removed = 0;
        while removed < count {
            let chunk = DELETE_CHUNK.min(count - removed);
            let n = self.delete_oldest_chunk(None, chunk);
            removed += n;
            if n < chunk {
                break;
            }
        }
        removed
    }

    /// Drop everything. Cumulative stats counters survive.
    pub fn clear(&self) {
        let _gate = self.write_gate.lock().unwrap();
        self.primary.clear();
        self.temporal.write().unwrap().clear();
        self.process.clear();
        self.function.clear();
        self.correlation.clear();
        self.ast_node.clear();
        self.stats.reset();
    }

    /// Membership is reconstructed from the primary record, which is why
    /// the record is fetched before anything is removed.
    fn delete_locked(&self, event_id: &str) -> TraceResult<()> {
        let event = match self.primary.get(event_id) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Err(TraceError::not_found(event_id)),
        };

        self.unindex(&event);
        self.primary.remove(event_id);
        self.stats.record_delete(event.estimated_size());
        Ok(())
    }

    fn unindex(&self, event: &TraceEvent) {
        let id = &event.event_id;
        {
            let mut temporal = self.temporal.write().unwrap();
            if let Some(bucket) = temporal.get_mut(&event.timestamp) {
                bucket.retain(|x| x != id);
                if bucket.is_empty() {
                    temporal.remove(&event.timestamp);
                }
            }
        }
        Self::remove_id(&self.process, &event.pid, id);
        Self::remove_id(&self.function, &event.function_key(), id);
        if let Some(corr) = &event.correlation_id {
            Self::remove_id(&self.correlation, corr, id);
        }
        if let Some(node) = &event.ast_node_id {
            Self::remove_id(&self.ast_node, node, id);
        }
    }

    fn remove_id<K>(map: &FxDashMap<K, Vec<String>>, key: &K, id: &str)
    where
        K: std::hash::Hash + Eq + Clone,
    {
        let emptied = match map.get_mut(key) {
            Some(mut list) => {
                list.retain(|x| x != id);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            map.remove_if(key, |_, list| list.is_empty());
        }
    }

    /// Remove up to `max` oldest events under one gate acquisition.
    fn delete_oldest_chunk(&self, cutoff: Option<u64>, max: usize) -> usize {
        let _gate = self.write_gate.lock().unwrap();

        let victims: Vec<(u64, String)> = {
            let temporal = self.temporal.read().unwrap();
            let range = match cutoff {
                Some(c) => temporal.range(..c),
                None => temporal.range(..),
            };
            range
                .flat_map(|(ts, ids)| ids.iter().map(move |id| (*ts, id.clone())))
                .take(max)
                .collect()
        };

        for (timestamp, id) in &victims {
            if self.delete_locked(id).is_err() {
                // Dangling temporal entry; sweep it so the scan can advance.
                tracing::warn!(event_id = %id, timestamp, "swept dangling temporal entry");
                self.stats.note_stale_index_hit();
                let mut temporal = self.temporal.write().unwrap();
                if let Some(bucket) = temporal.get_mut(timestamp) {
                    bucket.retain(|x| x != id);
                    if bucket.is_empty() {
                        temporal.remove(timestamp);
                    }
                }
            }
        }

        if !victims.is_empty() {
            self.refresh_bounds();
        }
        victims.len()
    }

    /// Re-read the temporal extremes into the stats watermarks.
    fn refresh_bounds(&self) {
        let temporal = self.temporal.read().unwrap();
        let oldest = temporal.first_key_value().map(|(ts, _)| *ts);
        let newest = temporal.last_key_value().map(|(ts, _)| *ts);
        self.stats.set_bounds(oldest, newest);
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub fn snapshot_stats(&self) -> StatsSnapshot {
        self.stats.snapshot(IndexSizes {
            temporal: self.temporal.read().unwrap().len(),
            process: self.process.len(),
            function: self.function.len(),
            correlation: self.correlation.len(),
            ast_node: self.ast_node.len(),
        })
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("total_events", &self.len())
            .finish()
    }
}
