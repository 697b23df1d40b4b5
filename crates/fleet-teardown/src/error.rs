//! Configuration validation errors
//!
//! Typed errors for teardown options, raised before any provider call.

use fleet_teardown_common::ResourceKind;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Budget is zero, negative or not a number
    #[error("rate budget for {kind} must be positive, got {value}")]
    NonPositiveBudget { kind: ResourceKind, value: f64 },

    /// Budget so small that its call interval cannot be scheduled
    #[error("rate budget for {kind} ({value}/s) is below the minimum of {min}/s")]
    BudgetTooLow { kind: ResourceKind, value: f64, min: f64 },

    /// Budget reaches the provider's documented limit
    #[error("rate budget for {kind} ({value}/s) must stay below the documented limit of {limit}/s")]
    BudgetAtLimit {
        kind: ResourceKind,
        value: f64,
        limit: f64,
    },

    /// Budget factor outside (0, 1)
    #[error("budget factor must be in (0, 1), got {0}")]
    InvalidBudgetFactor(f64),

    /// Worker count is zero
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    /// region field is empty
    #[error("region cannot be empty")]
    EmptyRegion,

    /// Custom device prefix given but empty
    #[error("custom device prefix cannot be empty")]
    EmptyPrefix,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ConfigError::InvalidBudgetFactor(1.5).to_string(),
            "budget factor must be in (0, 1), got 1.5"
        );
        assert_eq!(
            ConfigError::BudgetAtLimit {
                kind: ResourceKind::Device,
                value: 10.0,
                limit: 10.0
            }
            .to_string(),
            "rate budget for device (10/s) must stay below the documented limit of 10/s"
        );
    }
}
