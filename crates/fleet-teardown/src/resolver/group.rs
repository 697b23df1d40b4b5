//! Device groups
//!
//! Dynamic groups compute their membership from a query filter, so there is
//! nothing to remove and they use their own deletion call. Static groups
//! have each member removed before the group itself goes.

use super::StepLog;
use crate::aws::{AwsResult, FleetOperations};
use crate::resource::{Resource, attr};
use tracing::debug;

pub(super) async fn delete_group<F: FleetOperations>(
    ops: &F,
    group: &Resource,
    log: &mut StepLog<'_>,
) -> AwsResult<()> {
    let name = group.name.as_str();

    let dynamic = match ops.is_dynamic_group(name).await {
        Ok(dynamic) => dynamic,
        Err(e) => {
            let listed = group.flag(attr::QUERY_FILTER).unwrap_or(false);
            debug!(group = %name, error = %e, dynamic = listed, "Probe failed, using listing data");
            listed
        }
    };

    if dynamic {
        debug!(group = %name, "Dynamic group, skipping membership removal");
        return ops.delete_dynamic_group(name).await;
    }

    for member in log.listed("list members", ops.list_group_members(name).await) {
        let result = ops.remove_group_member(name, &member).await;
        log.record(format!("member:{member}"), result);
    }

    ops.delete_static_group(name).await
}

#[cfg(test)]
mod tests {
    use crate::aws::{AwsError, MockFleetOperations};
    use crate::resolver::DependencyResolver;
    use crate::resource::{Resource, attr};
    use fleet_teardown_common::ResourceKind;

    #[tokio::test]
    async fn test_static_group_removes_members_first() {
        let mut ops = MockFleetOperations::new();
        ops.expect_is_dynamic_group().returning(|_| Ok(false));
        ops.expect_list_group_members()
            .returning(|_| Ok(vec!["Vehicle-VIN-001".into(), "Vehicle-VIN-002".into()]));
        ops.expect_remove_group_member()
            .withf(|group, _| group == "SedanVehicles")
            .times(2)
            .returning(|_, _| Ok(()));
        ops.expect_delete_static_group().times(1).returning(|_| Ok(()));
        ops.expect_delete_dynamic_group().never();

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver
            .delete_with_dependencies(&Resource::new(ResourceKind::DeviceGroup, "SedanVehicles"))
            .await;

        assert!(outcome.success);
        assert_eq!(
            outcome.children_deleted,
            vec![
                "member:Vehicle-VIN-001",
                "member:Vehicle-VIN-002",
                "SedanVehicles"
            ]
        );
    }

    #[tokio::test]
    async fn test_dynamic_group_skips_membership() {
        let mut ops = MockFleetOperations::new();
        ops.expect_is_dynamic_group().returning(|_| Ok(true));
        ops.expect_list_group_members().never();
        ops.expect_remove_group_member().never();
        ops.expect_delete_static_group().never();
        ops.expect_delete_dynamic_group()
            .withf(|group| group == "Fleet-Moving")
            .times(1)
            .returning(|_| Ok(()));

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver
            .delete_with_dependencies(&Resource::new(ResourceKind::DeviceGroup, "Fleet-Moving"))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.children_deleted, vec!["Fleet-Moving"]);
    }

    #[tokio::test]
    async fn test_failed_probe_uses_listing_flag() {
        let mut ops = MockFleetOperations::new();
        ops.expect_is_dynamic_group()
            .returning(|_| Err(AwsError::Throttled));
        ops.expect_delete_dynamic_group().times(1).returning(|_| Ok(()));

        let resolver = DependencyResolver::new(&ops, false);
        let group = Resource::new(ResourceKind::DeviceGroup, "Fleet-Parked")
            .with_attr(attr::QUERY_FILTER, "true");

        assert!(resolver.delete_with_dependencies(&group).await.success);
    }
}
