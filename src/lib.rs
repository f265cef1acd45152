//! tracebase — an in-memory, multi-indexed store for runtime trace events.
//!
//! Structured events from an instrumentation pipeline land in a primary
//! table fanned out to five secondary indexes (temporal, process, function,
//! correlation, AST node). Downstream analyzers — correlators, temporal
//! debuggers, query tools — ask filter-based questions that are answered
//! from the most selective index and streamed back bounded and ordered.
//!
//! ```text
//! producers ──► TraceDb::store ──► EventStore (primary + index fan-out)
//! consumers ──► TraceDb::query ──► planner ──► driver index scan
//!                                              └► primary lookup + residual filter
//! timer     ──► pruner ──► oldest-first eviction from every table
//! ```
//!
//! # Example
//!
//! ```
//! use tracebase::{Pid, QueryFilter, TraceDb, TraceDbConfig, TraceEvent};
//!
//! let db = TraceDb::start(TraceDbConfig::default())?;
//! db.store(
//!     TraceEvent::new("evt-1", 1_700_000_000_000, Pid::new("<0.42.0>"),
//!                     "auth", "login", 2, "call")
//!         .with_correlation("req-9"),
//! )?;
//!
//! let hits = db.query(&QueryFilter::default().with_correlation_id("req-9"))?;
//! assert_eq!(hits.len(), 1);
//! db.shutdown();
//! # Ok::<(), tracebase::TraceError>(())
//! ```
//!
//! Durability, cross-node distribution, and the capture pipeline are out of
//! scope; this crate is the in-process core those collaborators sit around.

pub mod coordinator;
pub mod types;

pub use coordinator::TraceDb;
pub use types::{
    BatchOutcome, FunctionKey, IndexSizes, Order, Pid, QueryFilter, StatsSnapshot, TraceDbConfig,
    TraceError, TraceEvent, TraceResult,
};
