//! Discovered resource snapshots
//!
//! A `Resource` is what a lister returned for one cloud object. The engine
//! reads it and issues calls referencing its identity, but never changes it.

use fleet_teardown_common::ResourceKind;
use std::collections::{BTreeMap, HashMap};

/// Well-known keys of the provider attribute bag
pub mod attr {
    /// Device that owns a shadow record
    pub const OWNER: &str = "owner";
    /// Shadow name of a device-state record (absent for the classic shadow)
    pub const SHADOW: &str = "shadow";
    /// "true" when a group has a live query filter
    pub const QUERY_FILTER: &str = "has-query-filter";
    /// Certificate id (the ARN suffix)
    pub const CERTIFICATE_ID: &str = "certificate-id";
    /// Provider status string of a certificate
    pub const STATUS: &str = "status";
    /// "true" when a template is already deprecated
    pub const DEPRECATED: &str = "deprecated";
    /// Deprecation time of a template, seconds since the UNIX epoch
    pub const DEPRECATED_AT: &str = "deprecated-at";
}

/// Read-only snapshot of one discovered cloud object
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Category this resource belongs to
    pub kind: ResourceKind,
    /// Name or id used by every call targeting the resource
    pub name: String,
    /// Provider identity reference, when the listing returned one
    pub arn: Option<String>,
    /// Tags, when the listing already returned them
    pub tags: Option<HashMap<String, String>>,
    /// Other provider-returned fields
    pub attributes: BTreeMap<String, String>,
}

impl Resource {
    /// Create a bare resource with only a kind and a name
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            arn: None,
            tags: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Look up a provider attribute
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Interpret a provider attribute as a boolean flag
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.attr(key).map(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Device owning this record (device-state records)
    pub fn owner(&self) -> Option<&str> {
        self.attr(attr::OWNER)
    }

    /// Shadow name of a device-state record; `None` means the classic shadow
    pub fn shadow_name(&self) -> Option<&str> {
        self.attr(attr::SHADOW)
    }

    /// Certificate id, falling back to the ARN suffix and then the name
    pub fn certificate_id(&self) -> &str {
        self.attr(attr::CERTIFICATE_ID)
            .or_else(|| self.arn.as_deref().and_then(certificate_id_from_arn))
            .unwrap_or(&self.name)
    }
}

/// Extract the certificate id from a certificate ARN
/// (`arn:aws:iot:<region>:<account>:cert/<id>`).
pub fn certificate_id_from_arn(arn: &str) -> Option<&str> {
    arn.rsplit_once("cert/")
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_accessors() {
        let r = Resource::new(ResourceKind::DeviceGroup, "SedanVehicles")
            .with_arn("arn:aws:iot:us-east-1:123456789012:thinggroup/SedanVehicles")
            .with_attr(attr::QUERY_FILTER, "TRUE");

        assert_eq!(r.flag(attr::QUERY_FILTER), Some(true));
        assert_eq!(r.flag(attr::DEPRECATED), None);
        assert!(r.tags.is_none());
    }

    #[test]
    fn test_certificate_id_sources() {
        let by_attr = Resource::new(ResourceKind::Certificate, "abc")
            .with_attr(attr::CERTIFICATE_ID, "from-attr");
        assert_eq!(by_attr.certificate_id(), "from-attr");

        let by_arn = Resource::new(ResourceKind::Certificate, "abc")
            .with_arn("arn:aws:iot:us-east-1:123456789012:cert/deadbeef");
        assert_eq!(by_arn.certificate_id(), "deadbeef");

        let by_name = Resource::new(ResourceKind::Certificate, "abc");
        assert_eq!(by_name.certificate_id(), "abc");
    }

    #[test]
    fn test_certificate_id_from_malformed_arn() {
        assert_eq!(certificate_id_from_arn("arn:aws:iot:us-east-1:1:cert/"), None);
        assert_eq!(certificate_id_from_arn("not-an-arn"), None);
    }

    #[test]
    fn test_classic_shadow_has_no_name() {
        let classic =
            Resource::new(ResourceKind::DeviceState, "Vehicle-VIN-001/classic")
                .with_attr(attr::OWNER, "Vehicle-VIN-001");
        assert_eq!(classic.owner(), Some("Vehicle-VIN-001"));
        assert_eq!(classic.shadow_name(), None);
    }
}
