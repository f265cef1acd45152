//! Core types for tracebase: the event record, index key newtypes, the
//! shared error enum, and start-up configuration.
//!
//! This crate has no storage logic; it exists so the engine and the
//! public facade agree on one vocabulary.

pub mod config;
pub mod error;
pub mod event;

pub use config::TraceDbConfig;
pub use error::{TraceError, TraceResult};
pub use event::{FunctionKey, Pid, TraceEvent};
