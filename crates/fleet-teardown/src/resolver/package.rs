//! Firmware packages: every version goes before the package

use super::StepLog;
use crate::aws::{AwsResult, FleetOperations};

pub(super) async fn delete_package<F: FleetOperations>(
    ops: &F,
    package: &str,
    log: &mut StepLog<'_>,
) -> AwsResult<()> {
    for version in log.listed("list versions", ops.list_package_versions(package).await) {
        let result = ops.delete_package_version(package, &version).await;
        log.record(format!("version:{version}"), result);
    }

    ops.delete_package(package).await
}

#[cfg(test)]
mod tests {
    use crate::aws::{AwsError, MockFleetOperations};
    use crate::resolver::DependencyResolver;
    use crate::resource::Resource;
    use fleet_teardown_common::ResourceKind;

    #[tokio::test]
    async fn test_versions_then_package() {
        let mut ops = MockFleetOperations::new();
        ops.expect_list_package_versions()
            .returning(|_| Ok(vec!["1.0.0".into(), "1.1.0".into(), "2.0.0".into()]));
        ops.expect_delete_package_version()
            .withf(|_, version| version != "1.1.0")
            .returning(|_, _| Ok(()));
        // Already removed by someone else
        ops.expect_delete_package_version()
            .withf(|_, version| version == "1.1.0")
            .returning(|_, _| Err(AwsError::NotFound("version".into())));
        ops.expect_delete_package().times(1).returning(|_| Ok(()));

        let resolver = DependencyResolver::new(&ops, false);
        let outcome = resolver
            .delete_with_dependencies(&Resource::new(ResourceKind::Package, "TruckVehicle"))
            .await;

        assert!(outcome.success);
        assert_eq!(
            outcome.children_deleted,
            vec!["version:1.0.0", "version:2.0.0", "TruckVehicle"]
        );
    }
}
