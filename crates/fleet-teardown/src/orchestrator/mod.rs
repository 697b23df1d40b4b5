//! Per-category teardown
//!
//! `Orchestrator::process_category` pulls every resource of one batch through
//! identification and dependency-aware deletion. A bounded number of workers
//! share one rate pacer, and every outcome is tallied through a single
//! mutation point. Anything that goes wrong with one resource, including a
//! panic, is counted as a failure for that resource and the batch continues.

mod plan;
mod templates;

pub use plan::FleetTeardown;

use crate::aws::FleetOperations;
use crate::identify::{Identifier, NamingRules};
use crate::pacer::{RateBudgets, RatePacer};
use crate::resolver::DependencyResolver;
use crate::resource::Resource;
use fleet_teardown_common::{CategoryStats, ResourceKind};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Final state of one resource within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Deleted,
    Skipped,
    Failed,
}

/// Runs identification and deletion over batches of one category
pub struct Orchestrator<'a, F> {
    ops: &'a F,
    budgets: RateBudgets,
    concurrency: usize,
    dry_run: bool,
    cancel: Option<CancellationToken>,
}

impl<'a, F: FleetOperations> Orchestrator<'a, F> {
    pub fn new(ops: &'a F, budgets: RateBudgets, concurrency: usize, dry_run: bool) -> Self {
        Self {
            ops,
            budgets,
            concurrency: concurrency.max(1),
            dry_run,
            cancel: None,
        }
    }

    /// Forwarded to bounded waits inside deletion recipes
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// A fresh pacer holding this orchestrator's budget for `kind`
    pub fn pacer(&self, kind: ResourceKind) -> RatePacer {
        RatePacer::new(self.budgets.get(kind))
    }

    /// Identify and delete every fleet-owned resource of one batch.
    ///
    /// `custom_prefix` adds one device naming pattern for this call.
    pub async fn process_category(
        &self,
        resources: &[Resource],
        kind: ResourceKind,
        custom_prefix: Option<&str>,
    ) -> CategoryStats {
        let rules = NamingRules::new(custom_prefix);
        let identifier = Identifier::new(self.ops, &rules);
        let mut resolver = DependencyResolver::new(self.ops, self.dry_run);
        if let Some(token) = &self.cancel {
            resolver = resolver.with_cancel(token.clone());
        }
        let pacer = self.pacer(kind);
        let tally = Mutex::new(CategoryStats::new(resources.len()));

        info!(
            kind = %kind,
            count = resources.len(),
            budget_per_second = pacer.budget().max_per_second(),
            workers = self.concurrency,
            dry_run = self.dry_run,
            "Processing category"
        );

        let (identifier, resolver, pacer, stats) = (&identifier, &resolver, &pacer, &tally);
        stream::iter(resources)
            .for_each_concurrent(self.concurrency, move |resource| async move {
                let handled = AssertUnwindSafe(process_one(identifier, resolver, pacer, resource, kind))
                    .catch_unwind()
                    .await;

                let disposition = handled.unwrap_or_else(|panic| {
                    error!(
                        kind = %kind,
                        name = %resource.name,
                        panic = %panic_message(panic.as_ref()),
                        "Processing panicked"
                    );
                    Disposition::Failed
                });

                let mut stats = stats.lock().await;
                match disposition {
                    Disposition::Deleted => stats.record_deleted(),
                    Disposition::Skipped => stats.record_skipped(resource.name.clone()),
                    Disposition::Failed => stats.record_failed(),
                }
            })
            .await;

        let stats = tally.into_inner();
        info!(
            kind = %kind,
            total = stats.total,
            deleted = stats.deleted,
            skipped = stats.skipped,
            failed = stats.failed,
            "Category done"
        );
        stats
    }
}

async fn process_one<F: FleetOperations>(
    identifier: &Identifier<'_, F>,
    resolver: &DependencyResolver<'_, F>,
    pacer: &RatePacer,
    resource: &Resource,
    kind: ResourceKind,
) -> Disposition {
    if resource.kind != kind {
        warn!(
            expected = %kind,
            actual = %resource.kind,
            name = %resource.name,
            "Resource listed under the wrong category"
        );
        return Disposition::Failed;
    }

    let verdict = identifier.classify(resource).await;
    if !verdict.is_fleet_owned {
        debug!(kind = %kind, name = %resource.name, "Not fleet-owned, skipping");
        return Disposition::Skipped;
    }
    debug!(kind = %kind, name = %resource.name, method = %verdict.method, "Fleet-owned");

    if !resolver.is_dry_run() {
        pacer.admit().await;
    }
    if resolver.delete_with_dependencies(resource).await.success {
        Disposition::Deleted
    } else {
        Disposition::Failed
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{AwsError, MockFleetOperations};
    use fleet_teardown_common::tags::{TAG_FLEET, TAG_FLEET_VALUE};
    use std::collections::HashMap;

    fn fleet_tags() -> HashMap<String, String> {
        HashMap::from([(TAG_FLEET.to_string(), TAG_FLEET_VALUE.to_string())])
    }

    fn templates(names: &[&str]) -> Vec<Resource> {
        names
            .iter()
            .map(|n| Resource::new(ResourceKind::DeviceTypeTemplate, *n).with_tags(HashMap::new()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_is_isolated() {
        let mut ops = MockFleetOperations::new();
        ops.expect_delete_template()
            .withf(|name| name == "TruckVehicle")
            .returning(|_| Err(AwsError::Throttled));
        ops.expect_delete_template().returning(|_| Ok(()));

        let resources: Vec<Resource> = (0..5)
            .map(|i| {
                let name = if i == 2 { "TruckVehicle".to_string() } else { format!("t{i}") };
                Resource::new(ResourceKind::DeviceTypeTemplate, name).with_tags(fleet_tags())
            })
            .collect();

        let orchestrator = Orchestrator::new(&ops, RateBudgets::default(), 1, false);
        let stats = orchestrator
            .process_category(&resources, ResourceKind::DeviceTypeTemplate, None)
            .await;

        assert_eq!(stats.total, 5);
        assert_eq!(stats.deleted, 4);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_resources_are_skipped_by_name() {
        let ops = MockFleetOperations::new();
        let orchestrator = Orchestrator::new(&ops, RateBudgets::default(), 4, false);
        let stats = orchestrator
            .process_category(
                &templates(&["Lab-Template", "Other"]),
                ResourceKind::DeviceTypeTemplate,
                None,
            )
            .await;

        assert_eq!(stats.skipped, 2);
        let mut names = stats.skipped_names.clone();
        names.sort();
        assert_eq!(names, vec!["Lab-Template", "Other"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletions_respect_budget() {
        let mut ops = MockFleetOperations::new();
        ops.expect_delete_template().returning(|_| Ok(()));

        // 15/s limit * 0.2 = 3 per second
        let budgets = RateBudgets::with_factor(0.2).unwrap();
        let orchestrator = Orchestrator::new(&ops, budgets, 4, false);
        let resources: Vec<Resource> = (0..7)
            .map(|i| {
                Resource::new(ResourceKind::DeviceTypeTemplate, format!("t{i}"))
                    .with_tags(fleet_tags())
            })
            .collect();

        let start = tokio::time::Instant::now();
        let stats = orchestrator
            .process_category(&resources, ResourceKind::DeviceTypeTemplate, None)
            .await;

        assert_eq!(stats.deleted, 7);
        // 6 intervals of 1/3 s, less nanosecond rounding
        assert!(start.elapsed() >= std::time::Duration::from_millis(1990));
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_calls() {
        let ops = MockFleetOperations::new();
        let orchestrator = Orchestrator::new(&ops, RateBudgets::default(), 4, true);
        let resources = vec![
            Resource::new(ResourceKind::Device, "Vehicle-VIN-001").with_tags(HashMap::new()),
            Resource::new(ResourceKind::Device, "gateway").with_tags(HashMap::new()),
        ];

        let stats = orchestrator
            .process_category(&resources, ResourceKind::Device, None)
            .await;

        assert_eq!((stats.deleted, stats.skipped), (1, 1));
    }

    #[tokio::test]
    async fn test_wrong_category_is_failed() {
        let ops = MockFleetOperations::new();
        let orchestrator = Orchestrator::new(&ops, RateBudgets::default(), 1, true);
        let resources = vec![Resource::new(ResourceKind::Job, "ota-1")];

        let stats = orchestrator
            .process_category(&resources, ResourceKind::Device, None)
            .await;

        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
