//! Configuration types for a teardown run

use crate::error::ConfigError;
use crate::pacer::RateBudgets;
use fleet_teardown_common::defaults::{DEFAULT_BUDGET_FACTOR, DEFAULT_CONCURRENCY, DEFAULT_REGION};
use fleet_teardown_common::{CLEANUP_SEQUENCE, CleanupStep, ResourceKind};

/// AWS connection settings
#[derive(Debug, Clone)]
pub struct AwsSettings {
    /// AWS region
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            aws_profile: None,
        }
    }
}

/// Throughput settings
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Fraction of each documented provider limit used as the budget
    pub budget_factor: f64,
    /// Workers per category (1 = sequential)
    pub concurrency: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            budget_factor: DEFAULT_BUDGET_FACTOR,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl PacingConfig {
    pub fn budgets(&self) -> Result<RateBudgets, ConfigError> {
        RateBudgets::with_factor(self.budget_factor)
    }
}

/// Which resources are considered
#[derive(Debug, Clone, Default)]
pub struct SelectionConfig {
    /// Restrict the run to these categories; empty means all
    pub only: Vec<ResourceKind>,
    /// Extra device name prefix, tested before the built-in patterns
    pub custom_prefix: Option<String>,
}

impl SelectionConfig {
    /// Whether a step of the cleanup sequence runs under this selection.
    /// Settings toggles only run on a full (unrestricted) teardown.
    pub fn includes(&self, step: CleanupStep) -> bool {
        match step {
            _ if self.only.is_empty() => true,
            CleanupStep::Category(kind) => self.only.contains(&kind),
            CleanupStep::Settings(_) => false,
        }
    }

    /// Selected steps, in cleanup order
    pub fn steps(&self) -> Vec<CleanupStep> {
        CLEANUP_SEQUENCE
            .into_iter()
            .filter(|step| self.includes(*step))
            .collect()
    }
}

/// Configuration for a teardown run
///
/// Composed of focused sub-configs, built from the CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct TeardownConfig {
    pub aws: AwsSettings,
    pub pacing: PacingConfig,
    pub selection: SelectionConfig,
    /// Log what would be deleted without deleting anything
    pub dry_run: bool,
}

impl TeardownConfig {
    /// Reject unusable settings before any provider call
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aws.region.trim().is_empty() {
            return Err(ConfigError::EmptyRegion);
        }
        if self.pacing.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.selection.custom_prefix.as_deref() == Some("") {
            return Err(ConfigError::EmptyPrefix);
        }
        self.pacing.budgets()?;
        Ok(())
    }

    pub fn region(&self) -> &str {
        &self.aws.region
    }

    pub fn custom_prefix(&self) -> Option<&str> {
        self.selection.custom_prefix.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_teardown_common::SettingsToggle;

    #[test]
    fn test_default_config_is_valid_dry_run() {
        let config = TeardownConfig {
            dry_run: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.region(), "us-east-1");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = TeardownConfig::default();
        config.pacing.concurrency = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidConcurrency));

        let mut config = TeardownConfig::default();
        config.pacing.budget_factor = 1.2;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBudgetFactor(1.2)));

        let mut config = TeardownConfig::default();
        config.pacing.budget_factor = 1e-20;
        assert!(matches!(config.validate(), Err(ConfigError::BudgetTooLow { .. })));

        let mut config = TeardownConfig::default();
        config.selection.custom_prefix = Some(String::new());
        assert_eq!(config.validate(), Err(ConfigError::EmptyPrefix));

        let mut config = TeardownConfig::default();
        config.aws.region = " ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptyRegion));
    }

    #[test]
    fn test_full_selection_runs_every_step() {
        let selection = SelectionConfig::default();
        assert_eq!(selection.steps(), CLEANUP_SEQUENCE.to_vec());
    }

    #[test]
    fn test_subset_keeps_cleanup_order() {
        let selection = SelectionConfig {
            only: vec![
                ResourceKind::DeviceTypeTemplate,
                ResourceKind::Device,
                ResourceKind::StorageBucket,
            ],
            custom_prefix: None,
        };
        assert_eq!(
            selection.steps(),
            vec![
                CleanupStep::Category(ResourceKind::Device),
                CleanupStep::Category(ResourceKind::StorageBucket),
                CleanupStep::Category(ResourceKind::DeviceTypeTemplate),
            ]
        );
        assert!(!selection.includes(CleanupStep::Settings(SettingsToggle::FleetIndexing)));
    }
}
