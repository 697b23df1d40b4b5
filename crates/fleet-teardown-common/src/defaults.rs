//! Default configuration values shared across fleet-teardown components

use crate::resource_kind::ResourceKind;
use std::time::Duration;

/// Default AWS region for teardown runs
pub const DEFAULT_REGION: &str = "us-east-1";

/// Fraction of the documented provider limit used as the pacing budget
pub const DEFAULT_BUDGET_FACTOR: f64 = 0.8;

/// Smallest accepted pacing budget (calls per second)
pub const MIN_RATE_BUDGET: f64 = 0.01;

/// Default number of concurrent workers per category
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Maximum number of keys accepted by one batch object delete call
pub const MAX_DELETE_BATCH: usize = 1000;

/// Upper bound on the wait for a cancelled job to leave the running states
pub const JOB_CANCEL_MAX_WAIT: Duration = Duration::from_secs(15);

/// Delay between job status polls after a cancel request
pub const JOB_CANCEL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Provider-enforced delay between deprecating a template and deleting it
pub const TEMPLATE_DEPRECATION_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Extra wait on top of the cool-down to absorb clock skew
pub const TEMPLATE_COOLDOWN_MARGIN: Duration = Duration::from_secs(30);

/// Documented provider throughput limit (calls per second) of the terminal
/// delete call for each kind.
///
/// Budgets must stay strictly below these values.
pub fn documented_limit(kind: ResourceKind) -> f64 {
    match kind {
        ResourceKind::DeviceState => 20.0,
        ResourceKind::Certificate => 10.0,
        ResourceKind::Device => 10.0,
        ResourceKind::DeviceGroup => 10.0,
        ResourceKind::Command => 10.0,
        ResourceKind::Job => 10.0,
        ResourceKind::Package => 10.0,
        ResourceKind::StorageBucket => 10.0,
        ResourceKind::AccessRole => 10.0,
        ResourceKind::DeviceTypeTemplate => 15.0,
    }
}

/// Default pacing budget for a kind (documented limit scaled down)
pub fn default_budget(kind: ResourceKind) -> f64 {
    documented_limit(kind) * DEFAULT_BUDGET_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets_stay_below_documented_limits() {
        for kind in ResourceKind::ALL {
            let budget = default_budget(kind);
            assert!(budget > 0.0);
            assert!(
                budget < documented_limit(kind),
                "{kind} budget {budget} must be below its documented limit"
            );
        }
    }

    #[test]
    fn test_cooldown_margin_is_positive() {
        assert!(TEMPLATE_COOLDOWN_MARGIN > Duration::ZERO);
        assert!(JOB_CANCEL_POLL_INTERVAL < JOB_CANCEL_MAX_WAIT);
    }
}
