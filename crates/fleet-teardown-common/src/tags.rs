//! Fleet marker tag constants
//!
//! Provisioning tags every taggable fleet resource with one fixed marker
//! pair. Finding that pair is the strongest ownership evidence the
//! identifier accepts.
//!
//! | Tag Key | Value |
//! |---------|-------|
//! | `fleet-teardown:fleet` | `iot-training-fleet` |

use std::collections::HashMap;

/// Tag key marking fleet-owned resources
pub const TAG_FLEET: &str = "fleet-teardown:fleet";

/// Tag value marking fleet-owned resources
pub const TAG_FLEET_VALUE: &str = "iot-training-fleet";

/// Check whether a tag set carries the fleet marker pair
pub fn has_fleet_marker(tags: &HashMap<String, String>) -> bool {
    tags.get(TAG_FLEET).is_some_and(|v| v == TAG_FLEET_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_present() {
        let tags = HashMap::from([(TAG_FLEET.to_string(), TAG_FLEET_VALUE.to_string())]);
        assert!(has_fleet_marker(&tags));
    }

    #[test]
    fn test_marker_wrong_value() {
        let tags = HashMap::from([(TAG_FLEET.to_string(), "someone-else".to_string())]);
        assert!(!has_fleet_marker(&tags));
    }

    #[test]
    fn test_marker_absent() {
        assert!(!has_fleet_marker(&HashMap::new()));
        let tags = HashMap::from([("Name".to_string(), TAG_FLEET_VALUE.to_string())]);
        assert!(!has_fleet_marker(&tags));
    }
}
