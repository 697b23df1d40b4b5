//! Access roles
//!
//! A role with inline or attached managed policies cannot be deleted.

use super::StepLog;
use crate::aws::{AwsResult, FleetOperations};

pub(super) async fn delete_role<F: FleetOperations>(
    ops: &F,
    role: &str,
    log: &mut StepLog<'_>,
) -> AwsResult<()> {
    for policy in log.listed("list inline policies", ops.list_inline_policies(role).await) {
        let result = ops.delete_inline_policy(role, &policy).await;
        log.record(format!("inline-policy:{policy}"), result);
    }

    for arn in log.listed("list attached policies", ops.list_attached_policies(role).await) {
        let result = ops.detach_policy(role, &arn).await;
        log.record(format!("attached-policy:{arn}"), result);
    }

    ops.delete_role(role).await
}
