//! Storage engine for tracebase.
//!
//! Four pieces, leaves first:
//!
//! - [`store::EventStore`] — the primary table plus five secondary indexes
//!   (temporal, process, function, correlation, AST node), kept mutually
//!   consistent under a single writer gate with lock-free readers.
//! - [`planner`] — static selectivity heuristic mapping a filter set to a
//!   driving index and residual predicates.
//! - [`query`] — plan execution: candidate enumeration, primary resolution,
//!   residual filtering, ordering, limits, deadlines.
//! - [`pruner::Pruner`] — capacity and age enforcement, oldest-first.
//!
//! The public coordinator facade lives in the root `tracebase` crate; this
//! crate is the machinery underneath it.

pub mod planner;
pub mod pruner;
pub mod query;
pub mod stats;
pub mod store;

pub use planner::{plan, IndexDriver, Order, Plan, QueryFilter};
pub use pruner::{now_ms, Pruner};
pub use query::execute;
pub use stats::{IndexSizes, StatsSnapshot};
pub use store::{BatchOutcome, EventStore};
