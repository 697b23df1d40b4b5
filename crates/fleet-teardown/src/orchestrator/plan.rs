//! Whole-fleet teardown plan
//!
//! `FleetTeardown` walks the fixed cleanup sequence one step at a time. Each
//! category step lists the live resources of that kind and hands them to
//! the orchestrator; settings steps switch an account feature off. A step
//! starts only after the previous one has fully completed.

use super::Orchestrator;
use super::templates::prepare_templates;
use crate::aws::{FleetOperations, ResourceLister, ignore_not_found};
use crate::config::TeardownConfig;
use crate::error::ConfigError;
use crate::identify::{Identifier, NamingRules};
use crate::report::{CleanupReport, ScanRow};
use fleet_teardown_common::{CleanupStep, ResourceKind, SettingsToggle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Drives a complete teardown run against one account and region
pub struct FleetTeardown<'a, F, L> {
    ops: &'a F,
    lister: &'a L,
    config: TeardownConfig,
    orchestrator: Orchestrator<'a, F>,
    cancel: CancellationToken,
}

impl<'a, F: FleetOperations, L: ResourceLister> FleetTeardown<'a, F, L> {
    /// Validate `config` and prepare a run. Nothing is called yet.
    pub fn new(ops: &'a F, lister: &'a L, config: TeardownConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            ops,
            config.pacing.budgets()?,
            config.pacing.concurrency,
            config.dry_run,
        )
        .with_cancel(cancel.clone());

        Ok(Self {
            ops,
            lister,
            config,
            orchestrator,
            cancel,
        })
    }

    /// Token that stops the run before its next step when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every selected step in cleanup order
    pub async fn run(&self) -> CleanupReport {
        let started = Instant::now();
        let mut report = CleanupReport::new(self.config.dry_run);
        let steps = self.config.selection.steps();

        info!(
            steps = ?steps.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            dry_run = self.config.dry_run,
            "Starting fleet teardown"
        );

        for step in steps {
            if self.cancel.is_cancelled() {
                warn!(next = step.as_str(), "Teardown interrupted");
                report.interrupted = true;
                break;
            }
            match step {
                CleanupStep::Category(kind) => self.run_category(kind, &mut report).await,
                CleanupStep::Settings(toggle) => self.apply_setting(toggle, &mut report).await,
            }
        }

        report.elapsed = started.elapsed();
        report.finished_at = Some(chrono::Utc::now());
        info!(
            deleted = report.total_deleted(),
            failed = report.total_failed(),
            unlisted = report.unlisted.len(),
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Fleet teardown finished"
        );
        report
    }

    async fn run_category(&self, kind: ResourceKind, report: &mut CleanupReport) {
        let resources = match self.lister.list(kind).await {
            Ok(resources) => resources,
            Err(e) => {
                error!(kind = %kind, error = ?e, "Listing failed, skipping category");
                report.record_unlisted(kind);
                return;
            }
        };

        if kind == ResourceKind::DeviceTypeTemplate && !resources.is_empty() {
            if self.config.dry_run {
                info!("[DRY RUN] Would deprecate templates and wait for the cool-down");
            } else {
                let rules = NamingRules::new(self.config.custom_prefix());
                let identifier = Identifier::new(self.ops, &rules);
                let pacer = self.orchestrator.pacer(kind);
                prepare_templates(self.ops, &identifier, &pacer, &resources, Some(&self.cancel))
                    .await;
            }
        }

        let stats = self
            .orchestrator
            .process_category(&resources, kind, self.config.custom_prefix())
            .await;
        report.record(kind, stats);
    }

    async fn apply_setting(&self, toggle: SettingsToggle, report: &mut CleanupReport) {
        if self.config.dry_run {
            info!(setting = toggle.as_str(), "[DRY RUN] Would disable");
            return;
        }

        let result = match toggle {
            SettingsToggle::PackageConfiguration => self.ops.disable_package_configuration().await,
            SettingsToggle::FleetIndexing => self.ops.disable_fleet_indexing().await,
        };
        match ignore_not_found(result) {
            Ok(_) => {
                info!(setting = toggle.as_str(), "Disabled");
                report.settings_applied.push(toggle);
            }
            Err(e) => warn!(setting = toggle.as_str(), error = %e, "Failed to disable setting"),
        }
    }

    /// List and classify every selected category without deleting anything
    pub async fn scan(&self) -> Vec<ScanRow> {
        let rules = NamingRules::new(self.config.custom_prefix());
        let identifier = Identifier::new(self.ops, &rules);
        let mut rows = Vec::new();

        for step in self.config.selection.steps() {
            let CleanupStep::Category(kind) = step else {
                continue;
            };
            let resources = match self.lister.list(kind).await {
                Ok(resources) => resources,
                Err(e) => {
                    error!(kind = %kind, error = ?e, "Listing failed, skipping category");
                    continue;
                }
            };
            for resource in resources {
                let classification = identifier.classify(&resource).await;
                rows.push(ScanRow {
                    kind,
                    name: resource.name,
                    classification,
                });
            }
        }
        rows
    }
}
