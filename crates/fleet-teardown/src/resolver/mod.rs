//! Dependency-aware deletion
//!
//! Every kind has a fixed recipe: an ordered list of pre-deletion steps that
//! remove what would block the final call, then the terminal deletion call.
//! A failing pre-step is logged and the next one still runs; only the
//! terminal call decides success. A terminal "not found" counts as success,
//! which keeps repeated runs idempotent.

mod bucket;
mod device;
mod group;
mod job;
mod package;
mod role;

use crate::aws::{AwsError, AwsResult, FleetOperations, ignore_not_found};
use crate::resource::Resource;
use crate::wait::WaitConfig;
use fleet_teardown_common::ResourceKind;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of deleting one resource and its dependents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub resource_name: String,
    pub success: bool,
    /// Sub-resources actually removed, in removal order. On success the
    /// resource's own name is the last entry.
    pub children_deleted: Vec<String>,
}

impl DeletionOutcome {
    fn simulated(name: &str) -> Self {
        Self {
            resource_name: name.to_string(),
            success: true,
            children_deleted: vec![format!("{name} (simulated)")],
        }
    }
}

/// Running record of the dependency steps of one deletion
pub(crate) struct StepLog<'r> {
    resource: &'r Resource,
    removed: Vec<String>,
}

impl<'r> StepLog<'r> {
    fn new(resource: &'r Resource) -> Self {
        Self {
            resource,
            removed: Vec::new(),
        }
    }

    /// Record a removal step. Already-gone children are not listed.
    pub(crate) fn record(&mut self, child: String, result: AwsResult<()>) {
        match ignore_not_found(result) {
            Ok(Some(())) => {
                debug!(parent = %self.resource.name, child = %child, "Removed dependency");
                self.removed.push(child);
            }
            Ok(None) => debug!(parent = %self.resource.name, child = %child, "Already gone"),
            Err(e) => warn!(
                kind = %self.resource.kind,
                parent = %self.resource.name,
                child = %child,
                error = %e,
                "Failed to remove dependency, continuing"
            ),
        }
    }

    /// Record a step that changes state without removing anything
    pub(crate) fn attempt(&self, step: &str, result: AwsResult<()>) {
        match ignore_not_found(result) {
            Ok(_) => debug!(parent = %self.resource.name, step, "Step done"),
            Err(e) => warn!(
                kind = %self.resource.kind,
                parent = %self.resource.name,
                step,
                error = %e,
                "Dependency step failed, continuing"
            ),
        }
    }

    /// Unwrap a listing step; a failed listing means nothing to remove
    pub(crate) fn listed<T>(&self, step: &str, result: AwsResult<Vec<T>>) -> Vec<T> {
        match ignore_not_found(result) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!(
                    kind = %self.resource.kind,
                    parent = %self.resource.name,
                    step,
                    error = %e,
                    "Could not list dependencies, continuing"
                );
                Vec::new()
            }
        }
    }

    fn push(&mut self, entry: String) {
        self.removed.push(entry);
    }
}

/// Deletes confirmed fleet resources together with their dependents
pub struct DependencyResolver<'a, F> {
    ops: &'a F,
    dry_run: bool,
    job_wait: WaitConfig,
    cancel: Option<CancellationToken>,
}

impl<'a, F: FleetOperations> DependencyResolver<'a, F> {
    pub fn new(ops: &'a F, dry_run: bool) -> Self {
        Self {
            ops,
            dry_run,
            job_wait: WaitConfig::job_cancel(),
            cancel: None,
        }
    }

    /// Abort bounded waits (job cancellation) when `token` fires
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_job_wait(mut self, config: WaitConfig) -> Self {
        self.job_wait = config;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Delete `resource` after removing everything that depends on it.
    ///
    /// Never fails: the outcome carries success and what was removed.
    pub async fn delete_with_dependencies(&self, resource: &Resource) -> DeletionOutcome {
        if self.dry_run {
            info!(kind = %resource.kind, name = %resource.name, "[DRY RUN] Would delete");
            return DeletionOutcome::simulated(&resource.name);
        }

        let mut log = StepLog::new(resource);
        let terminal = self.run_recipe(resource, &mut log).await;

        match ignore_not_found(terminal) {
            Ok(deleted) => {
                if deleted.is_none() {
                    debug!(kind = %resource.kind, name = %resource.name, "Already deleted");
                }
                log.push(resource.name.clone());
                info!(
                    kind = %resource.kind,
                    name = %resource.name,
                    dependencies = log.removed.len() - 1,
                    "Deleted"
                );
                DeletionOutcome {
                    resource_name: resource.name.clone(),
                    success: true,
                    children_deleted: log.removed,
                }
            }
            Err(e) => {
                warn!(
                    kind = %resource.kind,
                    name = %resource.name,
                    error = %e,
                    "Failed to delete"
                );
                DeletionOutcome {
                    resource_name: resource.name.clone(),
                    success: false,
                    children_deleted: log.removed,
                }
            }
        }
    }

    /// Run the pre-steps of `resource`'s kind and return the terminal result
    async fn run_recipe(&self, resource: &Resource, log: &mut StepLog<'_>) -> AwsResult<()> {
        let ops = self.ops;
        let name = resource.name.as_str();
        match resource.kind {
            ResourceKind::Device => device::delete_device(ops, name, log).await,
            ResourceKind::Certificate => device::delete_certificate(ops, resource, log).await,
            ResourceKind::DeviceState => match resource.owner() {
                Some(owner) => {
                    ops.delete_shadow(owner, resource.shadow_name().map(str::to_string))
                        .await
                }
                None => Err(AwsError::other(format!(
                    "device-state record {name} has no owning device"
                ))),
            },
            ResourceKind::DeviceGroup => group::delete_group(ops, resource, log).await,
            ResourceKind::Package => package::delete_package(ops, name, log).await,
            ResourceKind::StorageBucket => bucket::delete_bucket(ops, name, log).await,
            ResourceKind::AccessRole => role::delete_role(ops, name, log).await,
            ResourceKind::Job => {
                job::delete_job(ops, name, &self.job_wait, self.cancel.as_ref(), log).await
            }
            ResourceKind::DeviceTypeTemplate => ops.delete_template(name).await,
            ResourceKind::Command => ops.delete_command(name).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockFleetOperations;
    use crate::resource::attr;
    use mockall::Sequence;

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        // A mock with no expectations panics on any call
        let ops = MockFleetOperations::new();
        let resolver = DependencyResolver::new(&ops, true);

        for kind in ResourceKind::ALL {
            let resource = Resource::new(kind, "Vehicle-VIN-001");
            let outcome = resolver.delete_with_dependencies(&resource).await;
            assert!(outcome.success);
            assert_eq!(
                outcome.children_deleted,
                vec!["Vehicle-VIN-001 (simulated)".to_string()]
            );
        }
    }

    #[tokio::test]
    async fn test_terminal_not_found_is_success() {
        let mut ops = MockFleetOperations::new();
        ops.expect_delete_template()
            .returning(|_| Err(AwsError::NotFound("gone".into())));

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver
            .delete_with_dependencies(&Resource::new(ResourceKind::DeviceTypeTemplate, "SUVVehicle"))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.children_deleted, vec!["SUVVehicle".to_string()]);
    }

    #[tokio::test]
    async fn test_terminal_failure_keeps_removed_children() {
        let mut ops = MockFleetOperations::new();
        ops.expect_list_package_versions()
            .returning(|_| Ok(vec!["1.0".into()]));
        ops.expect_delete_package_version().returning(|_, _| Ok(()));
        ops.expect_delete_package()
            .returning(|_| Err(AwsError::Conflict("versions remain".into())));

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver
            .delete_with_dependencies(&Resource::new(ResourceKind::Package, "SedanVehicle"))
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.children_deleted, vec!["version:1.0".to_string()]);
    }

    #[tokio::test]
    async fn test_device_state_deletes_owner_shadow() {
        let mut ops = MockFleetOperations::new();
        let mut seq = Sequence::new();
        ops.expect_delete_shadow()
            .withf(|device, shadow| device == "Vehicle-VIN-001" && shadow.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        ops.expect_delete_shadow()
            .withf(|device, shadow| {
                device == "Vehicle-VIN-001" && shadow.as_deref() == Some("diagnostics")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let resolver = DependencyResolver::new(&ops, false);
        let classic = Resource::new(ResourceKind::DeviceState, "Vehicle-VIN-001/classic")
            .with_attr(attr::OWNER, "Vehicle-VIN-001");
        let named = Resource::new(ResourceKind::DeviceState, "Vehicle-VIN-001/diagnostics")
            .with_attr(attr::OWNER, "Vehicle-VIN-001")
            .with_attr(attr::SHADOW, "diagnostics");

        assert!(resolver.delete_with_dependencies(&classic).await.success);
        assert!(resolver.delete_with_dependencies(&named).await.success);
    }

    #[tokio::test]
    async fn test_device_state_without_owner_fails() {
        let ops = MockFleetOperations::new();
        let resolver = DependencyResolver::new(&ops, false);
        let orphan = Resource::new(ResourceKind::DeviceState, "orphan/classic");

        let outcome = resolver.delete_with_dependencies(&orphan).await;
        assert!(!outcome.success);
        assert!(outcome.children_deleted.is_empty());
    }

    #[tokio::test]
    async fn test_command_and_template_are_single_calls() {
        let mut ops = MockFleetOperations::new();
        ops.expect_delete_command()
            .withf(|name| name == "fleet-cmd-reboot")
            .times(1)
            .returning(|_| Ok(()));

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver
            .delete_with_dependencies(&Resource::new(ResourceKind::Command, "fleet-cmd-reboot"))
            .await;
        assert_eq!(
            outcome,
            DeletionOutcome {
                resource_name: "fleet-cmd-reboot".into(),
                success: true,
                children_deleted: vec!["fleet-cmd-reboot".into()],
            }
        );
    }
}
