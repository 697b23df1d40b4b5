//! Storage buckets
//!
//! A versioned bucket must be emptied of every object version and delete
//! marker first. The whole listing is collected before anything is deleted
//! so pagination markers stay valid.

use super::StepLog;
use crate::aws::{AwsResult, FleetOperations, ObjectRef};
use fleet_teardown_common::defaults::MAX_DELETE_BATCH;
use tracing::{debug, warn};

pub(super) async fn delete_bucket<F: FleetOperations>(
    ops: &F,
    bucket: &str,
    log: &mut StepLog<'_>,
) -> AwsResult<()> {
    let objects = collect_versions(ops, bucket).await;
    debug!(bucket = %bucket, versions = objects.len(), "Emptying bucket");

    for chunk in objects.chunks(MAX_DELETE_BATCH) {
        match ops.delete_objects(bucket, chunk.to_vec()).await {
            Ok(removed) => log.record(format!("objects:{removed}"), Ok(())),
            Err(e) => log.record(format!("objects:{}", chunk.len()), Err(e)),
        }
    }

    ops.delete_bucket(bucket).await
}

/// Walk every page of versions and delete markers. A failing page ends the
/// walk; what was collected so far is still deleted.
async fn collect_versions<F: FleetOperations>(ops: &F, bucket: &str) -> Vec<ObjectRef> {
    let mut objects = Vec::new();
    let mut marker = None;
    loop {
        match ops.list_object_versions(bucket, marker.take()).await {
            Ok(page) => {
                objects.extend(page.objects);
                match page.next {
                    Some(next) => marker = Some(next),
                    None => break,
                }
            }
            Err(e) if e.is_not_found() => break,
            Err(e) => {
                warn!(bucket = %bucket, error = %e, "Could not list object versions, continuing");
                break;
            }
        }
    }
    objects
}
