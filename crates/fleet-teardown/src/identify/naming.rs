//! Fleet naming conventions
//!
//! Provisioning names every resource after a small set of conventions:
//! devices get a literal prefix plus a zero-padded sequence number, static
//! groups end in `Vehicles` or start with `Fleet-`, templates and packages
//! come from a closed vocabulary of vehicle models.

use fleet_teardown_common::ResourceKind;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

/// Vehicle models used for device-type templates and firmware packages
const VEHICLE_MODELS: &str = "SedanVehicle|SUVVehicle|TruckVehicle";

fn builtin_sources(kind: ResourceKind) -> Vec<String> {
    match kind {
        ResourceKind::Device => vec![
            r"^Vehicle-VIN-\d{3,}$".to_string(),
            r"^SimVehicle-\d{3,}$".to_string(),
        ],
        ResourceKind::DeviceGroup => vec![
            r"^[A-Z][A-Za-z]*Vehicles$".to_string(),
            r"^Fleet-[A-Za-z0-9_-]+$".to_string(),
        ],
        ResourceKind::DeviceTypeTemplate => vec![format!("^({VEHICLE_MODELS})$")],
        ResourceKind::Package => vec![format!("^({VEHICLE_MODELS})(-firmware)?$")],
        ResourceKind::Job => vec![
            r"^ota-[A-Za-z0-9_-]+$".to_string(),
            r"^firmware-update-[A-Za-z0-9_-]+$".to_string(),
        ],
        ResourceKind::StorageBucket => vec![r"^iot-firmware-[a-z0-9.-]+$".to_string()],
        ResourceKind::AccessRole => vec![r"^IoTFleet(Jobs|Package|S3)[A-Za-z0-9]*Role$".to_string()],
        ResourceKind::Command => vec![r"^fleet-cmd-[A-Za-z0-9_-]+$".to_string()],
        // Identified through their owning device instead
        ResourceKind::Certificate | ResourceKind::DeviceState => Vec::new(),
    }
}

static BUILTIN_PATTERNS: LazyLock<HashMap<ResourceKind, Vec<Regex>>> = LazyLock::new(|| {
    ResourceKind::ALL
        .into_iter()
        .map(|kind| {
            let patterns = builtin_sources(kind)
                .iter()
                .map(|src| Regex::new(src).expect("built-in naming pattern must compile"))
                .collect();
            (kind, patterns)
        })
        .collect()
});

/// Per-kind naming rules, plus an optional caller-supplied device prefix
#[derive(Debug, Clone, Default)]
pub struct NamingRules {
    custom_device: Option<Regex>,
}

impl NamingRules {
    /// Build the rule set. A custom prefix is escaped and must be followed
    /// by a sequence number to match.
    pub fn new(custom_prefix: Option<&str>) -> Self {
        let custom_device = custom_prefix
            .filter(|p| !p.is_empty())
            .and_then(|prefix| {
                let source = format!(r"^{}\d+$", regex::escape(prefix));
                match Regex::new(&source) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(prefix = %prefix, error = %e, "Ignoring unusable device prefix");
                        None
                    }
                }
            });
        Self { custom_device }
    }

    /// Pattern that matched `name`, if any. The custom device pattern is
    /// tested before the built-in ones.
    pub fn matching_pattern(&self, kind: ResourceKind, name: &str) -> Option<&str> {
        if kind == ResourceKind::Device {
            if let Some(re) = self.custom_device.as_ref().filter(|re| re.is_match(name)) {
                return Some(re.as_str());
            }
        }
        BUILTIN_PATTERNS
            .get(&kind)?
            .iter()
            .find(|re| re.is_match(name))
            .map(Regex::as_str)
    }

    pub fn matches(&self, kind: ResourceKind, name: &str) -> bool {
        self.matching_pattern(kind, name).is_some()
    }

    /// Device naming test used by association checks
    pub fn matches_device(&self, name: &str) -> bool {
        self.matches(ResourceKind::Device, name)
    }
}
