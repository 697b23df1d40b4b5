//! Resource categories and cleanup ordering
//!
//! Every category is processed as one homogeneous batch. Categories must be
//! cleaned in dependency order: shadows and certificates before the devices
//! that own them, devices before their groups, and device-type templates
//! last because the provider refuses to delete a template that is still
//! referenced and enforces a cool-down after deprecation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kinds of cloud resources owned by the training fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Stored state document of a device (classic or named shadow)
    DeviceState,
    /// X.509 certificate attached to devices
    Certificate,
    /// Registry entry of a simulated device
    Device,
    /// Static or dynamic device group
    DeviceGroup,
    /// Remote command definition
    Command,
    /// Deployment job
    Job,
    /// Firmware package and its versions
    Package,
    /// Storage bucket holding firmware artifacts
    StorageBucket,
    /// Access role used by jobs and package delivery
    AccessRole,
    /// Device type template (must be deprecated before deletion)
    DeviceTypeTemplate,
}

impl ResourceKind {
    /// All kinds, in cleanup order
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::DeviceState,
        ResourceKind::Certificate,
        ResourceKind::Device,
        ResourceKind::DeviceGroup,
        ResourceKind::Command,
        ResourceKind::Job,
        ResourceKind::Package,
        ResourceKind::StorageBucket,
        ResourceKind::AccessRole,
        ResourceKind::DeviceTypeTemplate,
    ];

    /// Stable identifier used on the command line and in logs
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::DeviceState => "device-state",
            ResourceKind::Certificate => "certificate",
            ResourceKind::Device => "device",
            ResourceKind::DeviceGroup => "device-group",
            ResourceKind::Command => "command",
            ResourceKind::Job => "job",
            ResourceKind::Package => "package",
            ResourceKind::StorageBucket => "storage-bucket",
            ResourceKind::AccessRole => "access-role",
            ResourceKind::DeviceTypeTemplate => "device-type-template",
        }
    }

    /// Whether the resource itself can carry the fleet marker tag
    pub fn is_taggable(self) -> bool {
        !matches!(self, ResourceKind::Certificate | ResourceKind::DeviceState)
    }

    /// Whether ownership is decided by walking an association edge
    pub fn uses_association(self) -> bool {
        matches!(self, ResourceKind::Certificate | ResourceKind::DeviceState)
    }

    /// Whether the listing call omits the identity reference needed to query
    /// tags, so a lookup-by-name must come first
    pub fn needs_reference_lookup(self) -> bool {
        matches!(self, ResourceKind::Package | ResourceKind::AccessRole)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown resource kind identifier
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown resource kind '{0}'")]
pub struct ParseKindError(pub String);

impl FromStr for ResourceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_last() {
        let last = ResourceKind::ALL.last().copied();
        assert_eq!(last, Some(ResourceKind::DeviceTypeTemplate));
    }

    #[test]
    fn test_parse_roundtrip_and_case() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>(), Ok(kind));
        }
        assert_eq!(" Device ".parse::<ResourceKind>(), Ok(ResourceKind::Device));
        assert!("thing".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_association_kinds_are_not_taggable() {
        for kind in ResourceKind::ALL {
            if kind.uses_association() {
                assert!(!kind.is_taggable(), "{kind} should not be tag-checked");
            }
        }
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ResourceKind::DeviceTypeTemplate).unwrap();
        assert_eq!(json, "\"device-type-template\"");
    }
}
