//! Deployment jobs
//!
//! A queued or running job is cancelled first and polled until it leaves
//! those states. The poll is bounded; when it runs out the job is
//! force-deleted anyway.

use super::StepLog;
use crate::aws::{AwsResult, FleetOperations};
use crate::wait::{WaitConfig, wait_for};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(super) async fn delete_job<F: FleetOperations>(
    ops: &F,
    job: &str,
    wait: &WaitConfig,
    cancel: Option<&CancellationToken>,
    log: &mut StepLog<'_>,
) -> AwsResult<()> {
    let active = match ops.job_status(job).await {
        Ok(status) => {
            debug!(job = %job, status = ?status, "Job status");
            status.is_active()
        }
        Err(e) if e.is_not_found() => return Err(e),
        Err(e) => {
            warn!(job = %job, error = %e, "Could not read job status, deleting anyway");
            false
        }
    };

    if active {
        log.record(format!("cancel:{job}"), ops.cancel_job(job).await);

        let settled = wait_for(
            wait.clone(),
            cancel,
            move || async move { Ok(!ops.job_status(job).await?.is_active()) },
            job,
        )
        .await;
        if let Err(e) = settled {
            warn!(job = %job, error = %e, "Job still active, force deleting");
        }
    }

    ops.delete_job(job).await
}

#[cfg(test)]
mod tests {
    use crate::aws::{AwsError, JobStatus, MockFleetOperations};
    use crate::resolver::DependencyResolver;
    use crate::resource::Resource;
    use crate::wait::WaitConfig;
    use fleet_teardown_common::ResourceKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn job(name: &str) -> Resource {
        Resource::new(ResourceKind::Job, name)
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_job_is_deleted_directly() {
        let mut ops = MockFleetOperations::new();
        ops.expect_job_status().returning(|_| Ok(JobStatus::Completed));
        ops.expect_cancel_job().never();
        ops.expect_delete_job().times(1).returning(|_| Ok(()));

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver.delete_with_dependencies(&job("ota-sedan-v2")).await;

        assert!(outcome.success);
        assert_eq!(outcome.children_deleted, vec!["ota-sedan-v2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_job_is_cancelled_and_polled() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();

        let mut ops = MockFleetOperations::new();
        ops.expect_job_status().returning(move |_| {
            // Running for the first check and two polls, then cancelled
            match counter.fetch_add(1, Ordering::SeqCst) {
                0..=2 => Ok(JobStatus::InProgress),
                _ => Ok(JobStatus::Canceled),
            }
        });
        ops.expect_cancel_job().times(1).returning(|_| Ok(()));
        ops.expect_delete_job().times(1).returning(|_| Ok(()));

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver.delete_with_dependencies(&job("ota-suv-v3")).await;

        assert!(outcome.success);
        assert_eq!(outcome.children_deleted, vec!["cancel:ota-suv-v3", "ota-suv-v3"]);
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_job_wait_is_bounded() {
        let mut ops = MockFleetOperations::new();
        ops.expect_job_status().returning(|_| Ok(JobStatus::InProgress));
        ops.expect_cancel_job().returning(|_| Ok(()));
        ops.expect_delete_job().times(1).returning(|_| Ok(()));

        let wait = WaitConfig::job_cancel();
        let resolver = DependencyResolver::new(&ops, false).with_job_wait(wait.clone());

        let start = Instant::now();
        let outcome = resolver
            .delete_with_dependencies(&job("firmware-update-stuck"))
            .await;

        assert!(outcome.success);
        assert!(start.elapsed() >= wait.timeout);
        assert!(start.elapsed() <= wait.timeout + wait.max_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_job_is_already_deleted() {
        let mut ops = MockFleetOperations::new();
        ops.expect_job_status()
            .returning(|_| Err(AwsError::NotFound("job".into())));
        ops.expect_delete_job().never();

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver.delete_with_dependencies(&job("ota-gone")).await;

        assert!(outcome.success);
    }
}
