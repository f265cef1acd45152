//! Trace event record and index key types.
//!
//! A `TraceEvent` is an immutable observation emitted by the instrumentation
//! pipeline. The store reads its fields to maintain indexes but never
//! interprets their meaning; the payload is carried as opaque JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque process handle.
///
/// Equality-comparable and hashable; the store never inspects the inner
/// value. Producers typically encode a runtime pid or scheduler handle here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    /// Create a pid from any displayable handle value.
    pub fn new(handle: impl Into<String>) -> Self {
        Pid(handle.into())
    }

    /// The raw handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pid {
    fn from(s: &str) -> Self {
        Pid(s.to_string())
    }
}

/// A `(module, function, arity)` triple naming a code location.
///
/// Used as the key of the function index; the full triple must be present
/// to drive that index, partial matches are residual filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionKey {
    pub module: String,
    pub function: String,
    pub arity: u32,
}

impl FunctionKey {
    pub fn new(module: impl Into<String>, function: impl Into<String>, arity: u32) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            arity,
        }
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.module, self.function, self.arity)
    }
}

/// An immutable runtime trace event.
///
/// Created externally, inserted once, never mutated, and destroyed only by
/// pruning or an explicit clear. `event_id` is assumed unique across the
/// process lifetime; `timestamp` is a monotonic millisecond value that is
/// typically (but not strictly) increasing across inserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event_id: String,
    pub timestamp: u64,
    pub pid: Pid,
    pub module: String,
    pub function: String,
    pub arity: u32,
    /// Links causally related events; absent when the producer has no
    /// correlation context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Links the event to a static code node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast_node_id: Option<String>,
    /// Opaque tag; filterable but not indexed.
    pub event_type: String,
    /// Arbitrary producer data, not inspected by the store.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TraceEvent {
    /// Create an event with the required fields; optional fields start
    /// absent and the payload empty.
    pub fn new(
        event_id: impl Into<String>,
        timestamp: u64,
        pid: Pid,
        module: impl Into<String>,
        function: impl Into<String>,
        arity: u32,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
            pid,
            module: module.into(),
            function: function.into(),
            arity,
            correlation_id: None,
            ast_node_id: None,
            event_type: event_type.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// Attach a correlation id.
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Attach an AST node id.
    pub fn with_ast_node(mut self, ast_node_id: impl Into<String>) -> Self {
        self.ast_node_id = Some(ast_node_id.into());
        self
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// The function-index key for this event.
    pub fn function_key(&self) -> FunctionKey {
        FunctionKey {
            module: self.module.clone(),
            function: self.function.clone(),
            arity: self.arity,
        }
    }

    /// Approximate in-memory footprint in bytes.
    ///
    /// Struct size plus owned string lengths plus the JSON rendering of the
    /// payload. Advisory only; actual heap usage differs.
    pub fn estimated_size(&self) -> usize {
        let strings = self.event_id.len()
            + self.pid.0.len()
            + self.module.len()
            + self.function.len()
            + self.event_type.len()
            + self.correlation_id.as_ref().map_or(0, String::len)
            + self.ast_node_id.as_ref().map_or(0, String::len);
        let payload = match &self.payload {
            serde_json::Value::Null => 0,
            other => other.to_string().len(),
        };
        std::mem::size_of::<TraceEvent>() + strings + payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn function_key_from_event() {
        let ev = TraceEvent::new("e1", 100, Pid::new("<0.42.0>"), "auth", "login", 2, "call");
        assert_eq!(ev.function_key(), FunctionKey::new("auth", "login", 2));
    }

    #[test]
    fn optional_fields_start_absent() {
        let ev = TraceEvent::new("e1", 100, Pid::new("p1"), "m", "f", 0, "call");
        assert!(ev.correlation_id.is_none());
        assert!(ev.ast_node_id.is_none());
        assert!(ev.payload.is_null());
    }

    #[test]
    fn with_constructors_set_fields() {
        let ev = TraceEvent::new("e1", 100, Pid::new("p1"), "m", "f", 0, "call")
            .with_correlation("c1")
            .with_ast_node("n1")
            .with_payload(json!({"args": [1, 2]}));
        assert_eq!(ev.correlation_id.as_deref(), Some("c1"));
        assert_eq!(ev.ast_node_id.as_deref(), Some("n1"));
        assert_eq!(ev.payload["args"][0], 1);
    }

    #[test]
    fn serde_roundtrip_with_optional_fields() {
        let ev = TraceEvent::new("e1", 100, Pid::new("p1"), "m", "f", 1, "return")
            .with_correlation("c1")
            .with_payload(json!({"result": "ok"}));
        let s = serde_json::to_string(&ev).unwrap();
        let restored: TraceEvent = serde_json::from_str(&s).unwrap();
        assert_eq!(ev, restored);
    }

    #[test]
    fn serde_omits_absent_optionals() {
        let ev = TraceEvent::new("e1", 100, Pid::new("p1"), "m", "f", 1, "call");
        let s = serde_json::to_string(&ev).unwrap();
        assert!(!s.contains("correlation_id"));
        assert!(!s.contains("ast_node_id"));
    }

    #[test]
    fn estimated_size_grows_with_payload() {
        let small = TraceEvent::new("e1", 100, Pid::new("p1"), "m", "f", 1, "call");
        let big = small.clone().with_payload(json!({"blob": "x".repeat(1024)}));
        assert!(big.estimated_size() > small.estimated_size() + 1024);
    }

    #[test]
    fn pid_display_matches_handle() {
        let pid = Pid::new("<0.105.0>");
        assert_eq!(pid.to_string(), "<0.105.0>");
        assert_eq!(pid.as_str(), "<0.105.0>");
    }
}
