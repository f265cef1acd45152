//! Start-up configuration for a trace store instance.
//!
//! Configuration parsing (files, flags, env) is the surrounding service's
//! concern; this type is the validated, in-process representation.

use crate::error::{TraceError, TraceResult};
use serde::{Deserialize, Serialize};

/// Tunables recognized at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDbConfig {
    /// Hard cap on stored events; reaching it triggers a capacity prune.
    pub max_events: usize,
    /// Age cutoff for the periodic prune, in milliseconds. Absent disables
    /// age-based pruning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_ms: Option<u64>,
    /// Cadence of the periodic prune timer.
    pub cleanup_interval_ms: u64,
    /// Capacity prunes evict down to `max_events * low_water_ratio`.
    /// Must lie in (0, 1].
    pub low_water_ratio: f64,
    /// Result-size bound applied when a query supplies no limit.
    pub query_default_limit: usize,
}

impl Default for TraceDbConfig {
    fn default() -> Self {
        Self {
            max_events: 1_000_000,
            max_age_ms: None,
            cleanup_interval_ms: 60_000,
            low_water_ratio: 0.9,
            query_default_limit: 1_000,
        }
    }
}

impl TraceDbConfig {
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_max_age_ms(mut self, max_age_ms: u64) -> Self {
        self.max_age_ms = Some(max_age_ms);
        self
    }

    pub fn with_cleanup_interval_ms(mut self, interval_ms: u64) -> Self {
        self.cleanup_interval_ms = interval_ms;
        self
    }

    pub fn with_low_water_ratio(mut self, ratio: f64) -> Self {
        self.low_water_ratio = ratio;
        self
    }

    pub fn with_query_default_limit(mut self, limit: usize) -> Self {
        self.query_default_limit = limit;
        self
    }

    /// Reject incoherent settings before any table is built.
    pub fn validate(&self) -> TraceResult<()> {
        if !(self.low_water_ratio > 0.0 && self.low_water_ratio <= 1.0) {
            return Err(TraceError::invalid_config(format!(
                "low_water_ratio must be in (0, 1], got {}",
                self.low_water_ratio
            )));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(TraceError::invalid_config(
                "cleanup_interval_ms must be positive",
            ));
        }
        if self.query_default_limit == 0 {
            return Err(TraceError::invalid_config(
                "query_default_limit must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TraceDbConfig::default();
        assert_eq!(config.max_events, 1_000_000);
        assert_eq!(config.cleanup_interval_ms, 60_000);
        assert_eq!(config.query_default_limit, 1_000);
        assert!(config.max_age_ms.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn builder_chain_overrides() {
        let config = TraceDbConfig::default()
            .with_max_events(500)
            .with_max_age_ms(10_000)
            .with_low_water_ratio(0.5);
        assert_eq!(config.max_events, 500);
        assert_eq!(config.max_age_ms, Some(10_000));
        assert_eq!(config.low_water_ratio, 0.5);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_low_water() {
        for bad in [0.0, -0.1, 1.5] {
            let config = TraceDbConfig::default().with_low_water_ratio(bad);
            assert!(matches!(
                config.validate(),
                Err(TraceError::InvalidConfig { .. })
            ));
        }
        // 1.0 is inclusive
        TraceDbConfig::default()
            .with_low_water_ratio(1.0)
            .validate()
            .unwrap();
    }

    #[test]
    fn rejects_zero_interval_and_limit() {
        assert!(TraceDbConfig::default()
            .with_cleanup_interval_ms(0)
            .validate()
            .is_err());
        assert!(TraceDbConfig::default()
            .with_query_default_limit(0)
            .validate()
            .is_err());
    }

    #[test]
    fn max_events_zero_is_accepted() {
        // Pathological but legal; every insert then fails with
        // CapacityExceeded rather than at validation time.
        TraceDbConfig::default().with_max_events(0).validate().unwrap();
    }
}
