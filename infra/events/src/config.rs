use crate::error::EventBusError;
use serde::Deserialize;
use std::time::Duration;

/// Default per-tick dispatch budget.
pub const DEFAULT_DRAIN_BUDGET: Duration = Duration::from_millis(5);

/// Tunables for the drain loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Budget used by [`EventBus::tick`](crate::EventBus::tick), in milliseconds.
    pub drain_budget_ms: u64,
    /// A single handler running longer than this is logged as slow, in milliseconds. `0` turns
    /// the warning off.
    pub slow_handler_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { drain_budget_ms: 5, slow_handler_ms: 5 }
    }
}

impl BusConfig {
    #[must_use]
    pub const fn drain_budget(&self) -> Duration {
        Duration::from_millis(self.drain_budget_ms)
    }

    #[must_use]
    pub const fn slow_handler(&self) -> Duration {
        Duration::from_millis(self.slow_handler_ms)
    }

    /// Rejects settings that would make the bus unusable.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidConfiguration`] when the drain budget is zero.
    pub fn validate(&self) -> Result<(), EventBusError> {
        if self.drain_budget_ms == 0 {
            return Err(EventBusError::InvalidConfiguration {
                message: "drain_budget_ms must be greater than zero".into(),
                context: None,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_frame_budget() {
        let cfg = BusConfig::default();
        assert_eq!(cfg.drain_budget(), DEFAULT_DRAIN_BUDGET);
        assert_eq!(cfg.slow_handler(), Duration::from_millis(5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let cfg: BusConfig =
            serde_json::from_value(json!({ "drain_budget_ms": 16 })).expect("config deserialize");
        assert_eq!(cfg.drain_budget_ms, 16);
        assert_eq!(cfg.slow_handler_ms, 5);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let cfg = BusConfig { drain_budget_ms: 0, ..BusConfig::default() };
        assert!(matches!(cfg.validate(), Err(EventBusError::InvalidConfiguration { .. })));
    }
}
