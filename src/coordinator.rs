//! The coordinator: single public entry point over the engine.
//!
//! [`TraceDb`] owns the tables, serializes writes, runs the periodic prune
//! timer, and exposes the producer, consumer, and admin operations. It is a
//! cheaply-cloneable handle; every clone shares the same state, and the
//! timer stops when the instance is shut down or the last handle drops.
//!
//! # Concurrency
//!
//! Writes (`store`, `store_batch`, admin actions) serialize on a
//! coordinator-level lock so the capacity check and the insert it protects
//! act as one step. Queries and lookups never take that lock; they rely on
//! the store's reader discipline instead.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracebase_core::{TraceDbConfig, TraceError, TraceEvent, TraceResult};
use tracebase_engine::{
    execute, now_ms, plan, BatchOutcome, EventStore, Pruner, QueryFilter, StatsSnapshot,
};

/// Cancellable periodic prune task tied to the coordinator lifetime.
struct PruneTimer {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl PruneTimer {
    fn spawn(store: Arc<EventStore>, pruner: Pruner, interval: Duration) -> TraceResult<Self> {
        let (shutdown, rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("tracebase-pruner".to_string())
            .spawn(move || {
                tracing::debug!(interval_ms = interval.as_millis() as u64, "prune timer started");
                loop {
                    match rx.recv_timeout(interval) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            pruner.prune_aged(&store, now_ms());
                        }
                    }
                }
                tracing::debug!("prune timer stopped");
            })
            .map_err(|e| TraceError::internal(format!("failed to spawn prune timer: {e}")))?;
        Ok(Self { shutdown, handle })
    }

    fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.join();
    }
}

struct Inner {
    store: Arc<EventStore>,
    pruner: Pruner,
    config: TraceDbConfig,
    /// Serializes producers and admin actions; readers never touch it.
    write_lock: Mutex<()>,
    timer: Mutex<Option<PruneTimer>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.lock().unwrap().take() {
            timer.stop();
        }
    }
}

/// Process-wide handle to one trace store instance.
///
/// Clone is cheap; all clones share the tables and the timer.
#[derive(Clone)]
pub struct TraceDb {
    inner: Arc<Inner>,
}

impl TraceDb {
    /// Validate the config, build the tables, and start the periodic prune
    /// timer.
    pub fn start(config: TraceDbConfig) -> TraceResult<Self> {
        config.validate()?;
        let store = Arc::new(EventStore::new());
        let pruner = Pruner::new(config.max_events, config.low_water_ratio, config.max_age_ms);
        let timer = PruneTimer::spawn(
            Arc::clone(&store),
            pruner.clone(),
            Duration::from_millis(config.cleanup_interval_ms),
        )?;
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                pruner,
                config,
                write_lock: Mutex::new(()),
                timer: Mutex::new(Some(timer)),
            }),
        })
    }

    /// Cancel the prune timer. Idempotent; the tables stay readable so
    /// late consumers can drain.
    pub fn shutdown(&self) {
        if let Some(timer) = self.inner.timer.lock().unwrap().take() {
            timer.stop();
        }
    }

    // =========================================================================
    // Producer interface
    // =========================================================================

    /// Store one event. A full store makes room by evicting oldest events
    /// first; only a zero-capacity config makes this fail with
    /// `CapacityExceeded`.
    pub fn store(&self, event: TraceEvent) -> TraceResult<()> {
        let _write = self.inner.write_lock.lock().unwrap();
        self.inner.pruner.ensure_capacity(&self.inner.store, 1)?;
        self.inner.store.insert(event)
    }

    /// Store a batch. Duplicate ids (against the store or within the batch)
    /// are skipped and reported; a hard error stops the batch and already-
    /// inserted events remain.
    pub fn store_batch(&self, events: Vec<TraceEvent>) -> TraceResult<BatchOutcome> {
        let _write = self.inner.write_lock.lock().unwrap();
        let mut outcome = BatchOutcome::default();
        for event in events {
            let id = event.event_id.clone();
            self.inner.pruner.ensure_capacity(&self.inner.store, 1)?;
            match self.inner.store.insert(event) {
                Ok(()) => outcome.inserted += 1,
                Err(TraceError::DuplicateId { .. }) => outcome.skipped_ids.push(id),
                Err(other) => return Err(other),
            }
        }
        Ok(outcome)
    }

    // =========================================================================
    // Consumer interface
    // =========================================================================

    /// Run a filtered query without a deadline.
    pub fn query(&self, filter: &QueryFilter) -> TraceResult<Vec<Arc<TraceEvent>>> {
        let plan = plan(filter, self.inner.config.query_default_limit)?;
        execute(&self.inner.store, &plan, None)
    }

    /// Run a filtered query, abandoning the scan with `Timeout` once
    /// `timeout` elapses. Partial results are never returned.
    pub fn query_with_deadline(
        &self,
        filter: &QueryFilter,
        timeout: Duration,
    ) -> TraceResult<Vec<Arc<TraceEvent>>> {
        let plan = plan(filter, self.inner.config.query_default_limit)?;
        let deadline = Instant::now() + timeout;
        execute(&self.inner.store, &plan, Some(deadline))
    }

    /// Fetch one event by id.
    pub fn get(&self, event_id: &str) -> TraceResult<Arc<TraceEvent>> {
        self.inner
            .store
            .lookup(event_id)
            .ok_or_else(|| TraceError::not_found(event_id))
    }

    /// Counters consistent with the last completed write or prune.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.store.snapshot_stats()
    }

    // =========================================================================
    // Admin interface
    // =========================================================================

    /// Remove every event strictly older than `cutoff`; returns the count.
    pub fn cleanup(&self, cutoff: u64) -> usize {
        let _write = self.inner.write_lock.lock().unwrap();
        self.inner.pruner.cleanup(&self.inner.store, cutoff)
    }

    /// Drop all events.
    pub fn clear(&self) {
        let _write = self.inner.write_lock.lock().unwrap();
        self.inner.store.clear();
    }

    /// The config this instance started with.
    pub fn config(&self) -> &TraceDbConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for TraceDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceDb")
            .field("total_events", &self.inner.store.len())
            .field("max_events", &self.inner.config.max_events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracebase_core::Pid;

    fn config() -> TraceDbConfig {
        TraceDbConfig::default().with_max_events(100)
    }

    fn event(id: &str, ts: u64) -> TraceEvent {
        TraceEvent::new(id, ts, Pid::new("p1"), "m", "f", 0, "call")
    }

    #[test]
    fn start_validates_config() {
        let bad = TraceDbConfig::default().with_low_water_ratio(2.0);
        assert!(matches!(
            TraceDb::start(bad),
            Err(TraceError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn store_then_get_roundtrip() {
        let db = TraceDb::start(config()).unwrap();
        let ev = event("e1", 100);
        db.store(ev.clone()).unwrap();
        assert_eq!(*db.get("e1").unwrap(), ev);
        db.shutdown();
    }

    #[test]
    fn get_missing_is_not_found() {
        let db = TraceDb::start(config()).unwrap();
        assert!(matches!(db.get("ghost"), Err(TraceError::NotFound { .. })));
        db.shutdown();
    }

    #[test]
    fn clones_share_state() {
        let db = TraceDb::start(config()).unwrap();
        let other = db.clone();
        db.store(event("e1", 100)).unwrap();
        assert!(other.get("e1").is_ok());
        assert_eq!(other.stats().total_events, 1);
        db.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent_and_leaves_tables_readable() {
        let db = TraceDb::start(config()).unwrap();
        db.store(event("e1", 100)).unwrap();
        db.shutdown();
        db.shutdown();
        assert!(db.get("e1").is_ok());
    }

    #[test]
    fn zero_capacity_store_fails() {
        let db = TraceDb::start(TraceDbConfig::default().with_max_events(0)).unwrap();
        assert!(matches!(
            db.store(event("e1", 100)),
            Err(TraceError::CapacityExceeded { .. })
        ));
        db.shutdown();
    }
}
