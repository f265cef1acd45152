//! Public types for the tracebase unified API.
//!
//! This module re-exports types from internal crates with a clean public
//! interface.

// ============================================================================
// Public API types - these are what users should use
// ============================================================================

// Event record and index key types
pub use tracebase_core::event::{FunctionKey, Pid, TraceEvent};

// Errors and results
pub use tracebase_core::error::{TraceError, TraceResult};

// Start-up configuration
pub use tracebase_core::config::TraceDbConfig;

// Query vocabulary
pub use tracebase_engine::planner::{Order, QueryFilter};

// Batch and stats results
pub use tracebase_engine::stats::{IndexSizes, StatsSnapshot};
pub use tracebase_engine::store::BatchOutcome;
