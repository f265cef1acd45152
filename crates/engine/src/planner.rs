//! Query planning: pick the driving index for a filter set.
//!
//! The heuristic is static; no runtime statistics are consulted. The
//! selectivity ladder, most selective first: correlation id, AST node id,
//! full `(module, function, arity)` key, pid, temporal range, full scan.
//! Whatever the driver does not satisfy stays behind as a residual filter
//! evaluated per candidate after the primary lookup.
//!
//! Keeping the heuristic behind [`plan`] lets a statistics-driven planner
//! replace it later without touching the store.

use serde::{Deserialize, Serialize};
use tracebase_core::{FunctionKey, Pid, TraceError, TraceEvent, TraceResult};

/// Result ordering by `(timestamp, event_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
}

/// A consumer query: every field optional, all present clauses ANDed.
///
/// Unknown keys are rejected at the serde boundary, making malformed
/// filters a deserialization-time `InvalidFilter` for callers that arrive
/// via JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryFilter {
    pub pid: Option<Pid>,
    pub event_type: Option<String>,
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub correlation_id: Option<String>,
    pub ast_node_id: Option<String>,
    pub module: Option<String>,
    pub function: Option<String>,
    pub arity: Option<u32>,
    pub limit: Option<usize>,
    pub order: Option<Order>,
}

impl QueryFilter {
    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: u64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_ast_node_id(mut self, ast_node_id: impl Into<String>) -> Self {
        self.ast_node_id = Some(ast_node_id.into());
        self
    }

    pub fn with_function(
        mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        arity: u32,
    ) -> Self {
        self.module = Some(module.into());
        self.function = Some(function.into());
        self.arity = Some(arity);
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Reject incoherent ranges.
    pub fn validate(&self) -> TraceResult<()> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(TraceError::invalid_filter(format!(
                    "since ({since}) is after until ({until})"
                )));
            }
        }
        Ok(())
    }

    /// True when no predicate clause is present (`limit`/`order` are not
    /// predicates).
    pub fn is_unfiltered(&self) -> bool {
        self.pid.is_none()
            && self.event_type.is_none()
            && self.since.is_none()
            && self.until.is_none()
            && self.correlation_id.is_none()
            && self.ast_node_id.is_none()
            && self.module.is_none()
            && self.function.is_none()
            && self.arity.is_none()
    }

    /// Evaluate every present clause against an event. Events lacking an
    /// optional field never match a filter on that field.
    pub fn matches(&self, event: &TraceEvent) -> bool {
        if let Some(pid) = &self.pid {
            if &event.pid != pid {
                return false;
            }
        }
        if let Some(event_type) = &self.event_type {
            if &event.event_type != event_type {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        if let Some(corr) = &self.correlation_id {
            if event.correlation_id.as_ref() != Some(corr) {
                return false;
            }
        }
        if let Some(node) = &self.ast_node_id {
            if event.ast_node_id.as_ref() != Some(node) {
                return false;
            }
        }
        if let Some(module) = &self.module {
            if &event.module != module {
                return false;
            }
        }
        if let Some(function) = &self.function {
            if &event.function != function {
                return false;
            }
        }
        if let Some(arity) = self.arity {
            if event.arity != arity {
                return false;
            }
        }
        true
    }
}

/// The index that enumerates candidates for a query.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexDriver {
    Correlation(String),
    AstNode(String),
    Function(FunctionKey),
    Process(Pid),
    Temporal { since: u64, until: u64 },
    FullScan,
}

/// Output of the planner: driver plus whatever it could not satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub driver: IndexDriver,
    /// Clauses the driver does not cover, applied after the primary lookup.
    pub residual: QueryFilter,
    pub order: Option<Order>,
    pub limit: usize,
}

/// Choose a driver for `filter`, falling back to `default_limit` when the
/// caller supplies none.
pub fn plan(filter: &QueryFilter, default_limit: usize) -> TraceResult<Plan> {
    filter.validate()?;

    let limit = filter.limit.unwrap_or(default_limit);
    let order = filter.order;
    let mut residual = filter.clone();
    residual.limit = None;
    residual.order = None;

    let driver = if let Some(corr) = residual.correlation_id.take() {
        IndexDriver::Correlation(corr)
    } else if let Some(node) = residual.ast_node_id.take() {
        IndexDriver::AstNode(node)
    } else if let (Some(module), Some(function), Some(arity)) = (
        residual.module.clone(),
        residual.function.clone(),
        residual.arity,
    ) {
        // Full (m, f, a) key; partial function filters stay residual.
        residual.module = None;
        residual.function = None;
        residual.arity = None;
        IndexDriver::Function(FunctionKey {
            module,
            function,
            arity,
        })
    } else if let Some(pid) = residual.pid.take() {
        IndexDriver::Process(pid)
    } else if residual.since.is_some() || residual.until.is_some() {
        let since = residual.since.take().unwrap_or(0);
        let until = residual.until.take().unwrap_or(u64::MAX);
        IndexDriver::Temporal { since, until }
    } else {
        IndexDriver::FullScan
    };

    Ok(Plan {
        driver,
        residual,
        order,
        limit,
    })
}
