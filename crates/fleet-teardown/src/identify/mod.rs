//! Fleet ownership identification
//!
//! Decides whether a discovered resource is ours to delete. Three methods
//! are tried in strict priority order and the first positive match wins:
//!
//! 1. Tag: the fleet marker pair on the resource itself
//! 2. Naming: the per-kind naming convention
//! 3. Association: certificates and device-state records are judged by the
//!    devices they belong to
//!
//! A failing lookup only disables the step it belongs to. When nothing
//! matches the resource is treated as foreign and left alone.

mod naming;

pub use naming::NamingRules;

use crate::aws::FleetOperations;
use crate::resource::Resource;
use fleet_teardown_common::ResourceKind;
use fleet_teardown_common::tags::has_fleet_marker;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Evidence that decided a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Tag,
    Naming,
    Association,
    None,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Tag => "tag",
            Method::Naming => "naming",
            Method::Association => "association",
            Method::None => "none",
        })
    }
}

/// Ownership verdict for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub is_fleet_owned: bool,
    pub method: Method,
}

impl Classification {
    pub fn owned(method: Method) -> Self {
        Self {
            is_fleet_owned: true,
            method,
        }
    }

    /// Conservative fallback: not ours
    pub fn foreign() -> Self {
        Self {
            is_fleet_owned: false,
            method: Method::None,
        }
    }
}

/// Classifies resources against the fleet's tags and naming rules
pub struct Identifier<'a, F> {
    ops: &'a F,
    rules: &'a NamingRules,
}

impl<'a, F: FleetOperations> Identifier<'a, F> {
    pub fn new(ops: &'a F, rules: &'a NamingRules) -> Self {
        Self { ops, rules }
    }

    /// Classify one resource. Never fails: lookup errors degrade to the
    /// next method.
    pub async fn classify(&self, resource: &Resource) -> Classification {
        if resource.kind.is_taggable() && self.tag_match(resource).await {
            return Classification::owned(Method::Tag);
        }

        if let Some(pattern) = self.rules.matching_pattern(resource.kind, &resource.name) {
            debug!(kind = %resource.kind, name = %resource.name, pattern, "Matched naming rule");
            return Classification::owned(Method::Naming);
        }

        if resource.kind.uses_association() && self.association_match(resource).await {
            return Classification::owned(Method::Association);
        }

        Classification::foreign()
    }

    async fn tag_match(&self, resource: &Resource) -> bool {
        if let Some(tags) = &resource.tags {
            return has_fleet_marker(tags);
        }

        let reference = match (&resource.arn, resource.kind.needs_reference_lookup()) {
            (Some(arn), _) => arn.clone(),
            (None, true) => match self.ops.lookup_reference(resource.kind, &resource.name).await {
                Ok(reference) => reference,
                Err(e) => {
                    debug!(
                        kind = %resource.kind,
                        name = %resource.name,
                        error = %e,
                        "Reference lookup failed, skipping tag check"
                    );
                    return false;
                }
            },
            (None, false) => resource.name.clone(),
        };

        match self.ops.resource_tags(resource.kind, &reference).await {
            Ok(tags) => has_fleet_marker(&tags),
            Err(e) => {
                debug!(
                    kind = %resource.kind,
                    name = %resource.name,
                    error = %e,
                    "Could not read tags"
                );
                false
            }
        }
    }

    async fn association_match(&self, resource: &Resource) -> bool {
        match resource.kind {
            ResourceKind::Certificate => {
                let Some(arn) = resource.arn.as_deref() else {
                    debug!(certificate = %resource.name, "No ARN, cannot walk attachments");
                    return false;
                };
                match self.ops.certificate_devices(arn).await {
                    Ok(devices) => devices.iter().any(|d| self.rules.matches_device(d)),
                    Err(e) => {
                        debug!(certificate = %resource.name, error = %e, "Could not list attached devices");
                        false
                    }
                }
            }
            ResourceKind::DeviceState => resource
                .owner()
                .is_some_and(|owner| self.rules.matches_device(owner)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{AwsError, MockFleetOperations};
    use crate::resource::attr;
    use fleet_teardown_common::tags::{TAG_FLEET, TAG_FLEET_VALUE};
    use std::collections::HashMap;

    fn fleet_tags() -> HashMap<String, String> {
        HashMap::from([(TAG_FLEET.to_string(), TAG_FLEET_VALUE.to_string())])
    }

    #[tokio::test]
    async fn test_tag_beats_naming() {
        let mut ops = MockFleetOperations::new();
        ops.expect_resource_tags()
            .withf(|kind, reference| {
                *kind == ResourceKind::Device && reference == "arn:aws:iot:::thing/edge-42"
            })
            .times(1)
            .returning(|_, _| Ok(fleet_tags()));

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let device =
            Resource::new(ResourceKind::Device, "edge-42").with_arn("arn:aws:iot:::thing/edge-42");

        assert_eq!(
            identifier.classify(&device).await,
            Classification::owned(Method::Tag)
        );
    }

    #[tokio::test]
    async fn test_tag_failure_falls_through_to_naming() {
        let mut ops = MockFleetOperations::new();
        ops.expect_resource_tags()
            .returning(|_, _| Err(AwsError::Throttled));

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let device = Resource::new(ResourceKind::Device, "Vehicle-VIN-007")
            .with_arn("arn:aws:iot:::thing/Vehicle-VIN-007");

        assert_eq!(
            identifier.classify(&device).await,
            Classification::owned(Method::Naming)
        );
    }

    #[tokio::test]
    async fn test_listing_tags_skip_the_lookup() {
        let mut ops = MockFleetOperations::new();
        ops.expect_resource_tags().never();

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let group = Resource::new(ResourceKind::DeviceGroup, "Payments").with_tags(fleet_tags());

        assert_eq!(
            identifier.classify(&group).await,
            Classification::owned(Method::Tag)
        );
    }

    #[tokio::test]
    async fn test_neither_tag_nor_name_is_foreign() {
        let mut ops = MockFleetOperations::new();
        ops.expect_resource_tags()
            .returning(|_, _| Ok(HashMap::from([("team".to_string(), "payments".to_string())])));
        ops.expect_certificate_devices().never();

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let job = Resource::new(ResourceKind::Job, "nightly-report").with_arn("arn:job");

        assert_eq!(identifier.classify(&job).await, Classification::foreign());
    }

    #[tokio::test]
    async fn test_package_lookup_failure_skips_tags() {
        let mut ops = MockFleetOperations::new();
        ops.expect_lookup_reference()
            .withf(|kind, name| *kind == ResourceKind::Package && name == "SedanVehicle")
            .times(1)
            .returning(|_, _| Err(AwsError::other("timeout")));
        ops.expect_resource_tags().never();

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let package = Resource::new(ResourceKind::Package, "SedanVehicle");

        assert_eq!(
            identifier.classify(&package).await,
            Classification::owned(Method::Naming)
        );
    }

    #[tokio::test]
    async fn test_role_lookup_then_tags() {
        let mut ops = MockFleetOperations::new();
        ops.expect_lookup_reference()
            .returning(|_, name| Ok(format!("arn:aws:iam::123456789012:role/{name}")));
        ops.expect_resource_tags()
            .withf(|kind, reference| {
                *kind == ResourceKind::AccessRole && reference.ends_with("role/CustomRole")
            })
            .returning(|_, _| Ok(fleet_tags()));

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let role = Resource::new(ResourceKind::AccessRole, "CustomRole");

        assert_eq!(
            identifier.classify(&role).await,
            Classification::owned(Method::Tag)
        );
    }

    #[tokio::test]
    async fn test_bucket_tags_are_read_by_name() {
        let mut ops = MockFleetOperations::new();
        ops.expect_lookup_reference().never();
        ops.expect_resource_tags()
            .withf(|kind, reference| {
                *kind == ResourceKind::StorageBucket && reference == "artifacts-7781"
            })
            .returning(|_, _| Ok(fleet_tags()));

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let bucket = Resource::new(ResourceKind::StorageBucket, "artifacts-7781");

        assert_eq!(
            identifier.classify(&bucket).await,
            Classification::owned(Method::Tag)
        );
    }

    #[tokio::test]
    async fn test_certificate_association() {
        let mut ops = MockFleetOperations::new();
        ops.expect_resource_tags().never();
        ops.expect_certificate_devices()
            .withf(|arn| arn == "arn:cert/fleet")
            .returning(|_| Ok(vec!["gateway".to_string(), "Vehicle-VIN-002".to_string()]));
        ops.expect_certificate_devices()
            .withf(|arn| arn == "arn:cert/other")
            .returning(|_| Ok(vec!["gateway".to_string()]));
        ops.expect_certificate_devices()
            .withf(|arn| arn == "arn:cert/flaky")
            .returning(|_| Err(AwsError::Throttled));

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);

        let fleet = Resource::new(ResourceKind::Certificate, "fleet").with_arn("arn:cert/fleet");
        let other = Resource::new(ResourceKind::Certificate, "other").with_arn("arn:cert/other");
        let flaky = Resource::new(ResourceKind::Certificate, "flaky").with_arn("arn:cert/flaky");
        let no_arn = Resource::new(ResourceKind::Certificate, "bare");

        assert_eq!(
            identifier.classify(&fleet).await,
            Classification::owned(Method::Association)
        );
        assert_eq!(identifier.classify(&other).await, Classification::foreign());
        assert_eq!(identifier.classify(&flaky).await, Classification::foreign());
        assert_eq!(identifier.classify(&no_arn).await, Classification::foreign());
    }

    #[tokio::test]
    async fn test_device_state_uses_owner_and_custom_prefix() {
        let ops = MockFleetOperations::new();
        let rules = NamingRules::new(Some("Truck-"));
        let identifier = Identifier::new(&ops, &rules);

        let owned = Resource::new(ResourceKind::DeviceState, "Truck-0009/classic")
            .with_attr(attr::OWNER, "Truck-0009");
        let foreign = Resource::new(ResourceKind::DeviceState, "lab-01/diagnostics")
            .with_attr(attr::OWNER, "lab-01")
            .with_attr(attr::SHADOW, "diagnostics");
        let orphan = Resource::new(ResourceKind::DeviceState, "Vehicle-VIN-001/classic");

        assert_eq!(
            identifier.classify(&owned).await,
            Classification::owned(Method::Association)
        );
        assert_eq!(identifier.classify(&foreign).await, Classification::foreign());
        assert_eq!(identifier.classify(&orphan).await, Classification::foreign());
    }
}
