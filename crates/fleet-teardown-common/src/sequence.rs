//! The cross-category teardown sequence
//!
//! One step must fully complete before the next begins. Later categories
//! assume the earlier ones are already gone.

use crate::resource_kind::ResourceKind;
use serde::Serialize;

/// Account-level setting switched off during teardown (no deletion involved)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettingsToggle {
    /// Automatic package version updates driven by jobs
    PackageConfiguration,
    /// Fleet indexing of device registry and connectivity data
    FleetIndexing,
}

impl SettingsToggle {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingsToggle::PackageConfiguration => "package-configuration",
            SettingsToggle::FleetIndexing => "fleet-indexing",
        }
    }
}

/// One step of the teardown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupStep {
    /// Delete every fleet-owned resource of a category
    Category(ResourceKind),
    /// Switch an account setting off
    Settings(SettingsToggle),
}

impl CleanupStep {
    pub fn as_str(self) -> &'static str {
        match self {
            CleanupStep::Category(kind) => kind.as_str(),
            CleanupStep::Settings(toggle) => toggle.as_str(),
        }
    }
}

/// Fixed teardown order.
///
/// Device-type templates are always last: deprecation is followed by a
/// multi-minute provider cool-down best absorbed at the end of the run.
pub const CLEANUP_SEQUENCE: [CleanupStep; 12] = [
    CleanupStep::Category(ResourceKind::DeviceState),
    CleanupStep::Category(ResourceKind::Certificate),
    CleanupStep::Category(ResourceKind::Device),
    CleanupStep::Category(ResourceKind::DeviceGroup),
    CleanupStep::Category(ResourceKind::Command),
    CleanupStep::Category(ResourceKind::Job),
    CleanupStep::Category(ResourceKind::Package),
    CleanupStep::Category(ResourceKind::StorageBucket),
    CleanupStep::Settings(SettingsToggle::PackageConfiguration),
    CleanupStep::Category(ResourceKind::AccessRole),
    CleanupStep::Settings(SettingsToggle::FleetIndexing),
    CleanupStep::Category(ResourceKind::DeviceTypeTemplate),
];
