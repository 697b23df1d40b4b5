//! Device-type template preparation
//!
//! The provider only deletes a template after it has been deprecated for a
//! cool-down period. Fleet-owned templates are deprecated first, then the
//! run waits until the most recent deprecation is old enough.

use crate::aws::FleetOperations;
use crate::identify::Identifier;
use crate::pacer::RatePacer;
use crate::resource::{Resource, attr};
use chrono::{DateTime, Utc};
use fleet_teardown_common::defaults::{TEMPLATE_COOLDOWN_MARGIN, TEMPLATE_DEPRECATION_COOLDOWN};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Full wait after a deprecation, margin included
pub(super) fn full_cooldown() -> Duration {
    TEMPLATE_DEPRECATION_COOLDOWN + TEMPLATE_COOLDOWN_MARGIN
}

/// Time left before a template deprecated at `deprecated_at` may be
/// deleted. An unknown deprecation time is assumed to be now.
pub(super) fn remaining_cooldown(deprecated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let Some(at) = deprecated_at else {
        return full_cooldown();
    };
    // A timestamp in the future (clock skew) converts to an error: full wait
    match (now - at).to_std() {
        Ok(elapsed) => full_cooldown().saturating_sub(elapsed),
        Err(_) => full_cooldown(),
    }
}

fn deprecated_at(template: &Resource) -> Option<DateTime<Utc>> {
    let secs = template.attr(attr::DEPRECATED_AT)?.parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}

/// Deprecate every fleet-owned template that is not deprecated yet, then
/// wait out the cool-down. Returns how many templates were deprecated.
pub(super) async fn prepare_templates<F: FleetOperations>(
    ops: &F,
    identifier: &Identifier<'_, F>,
    pacer: &RatePacer,
    templates: &[Resource],
    cancel: Option<&CancellationToken>,
) -> usize {
    let started = Instant::now();
    let now = Utc::now();
    let mut ready_at = started;
    let mut deprecated = 0;

    for template in templates {
        if !identifier.classify(template).await.is_fleet_owned {
            continue;
        }

        if template.flag(attr::DEPRECATED).unwrap_or(false) {
            let remaining = remaining_cooldown(deprecated_at(template), now);
            debug!(template = %template.name, remaining_secs = remaining.as_secs(), "Already deprecated");
            ready_at = ready_at.max(started + remaining);
            continue;
        }

        pacer.admit().await;
        match ops.deprecate_template(&template.name).await {
            Ok(()) => {
                info!(template = %template.name, "Deprecated");
                deprecated += 1;
                ready_at = ready_at.max(Instant::now() + full_cooldown());
            }
            Err(e) if e.is_not_found() => debug!(template = %template.name, "Already gone"),
            Err(e) => warn!(
                template = %template.name,
                error = %e,
                "Failed to deprecate, deletion will likely fail"
            ),
        }
    }

    let now = Instant::now();
    if ready_at > now {
        info!(
            wait_secs = (ready_at - now).as_secs(),
            "Waiting for template deprecation cool-down"
        );
        tokio::select! {
            _ = sleep_until(ready_at) => {}
            _ = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                warn!("Cool-down wait cancelled");
            }
        }
    }

    deprecated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{AwsError, MockFleetOperations};
    use crate::identify::NamingRules;
    use crate::pacer::RateBudget;
    use fleet_teardown_common::ResourceKind;
    use std::collections::HashMap;

    fn template(name: &str) -> Resource {
        Resource::new(ResourceKind::DeviceTypeTemplate, name).with_tags(HashMap::new())
    }

    fn pacer() -> RatePacer {
        RatePacer::new(RateBudget::new(ResourceKind::DeviceTypeTemplate, 12.0).unwrap())
    }

    #[test]
    fn test_remaining_cooldown() {
        let now = Utc::now();
        assert_eq!(remaining_cooldown(None, now), full_cooldown());
        assert_eq!(
            remaining_cooldown(Some(now - chrono::Duration::minutes(10)), now),
            Duration::ZERO
        );
        assert_eq!(
            remaining_cooldown(Some(now - chrono::Duration::minutes(2)), now),
            full_cooldown() - Duration::from_secs(120)
        );
        assert_eq!(
            remaining_cooldown(Some(now + chrono::Duration::minutes(1)), now),
            full_cooldown()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deprecates_owned_and_waits() {
        let mut ops = MockFleetOperations::new();
        ops.expect_deprecate_template()
            .withf(|name| name == "SedanVehicle" || name == "TruckVehicle")
            .times(2)
            .returning(|_| Ok(()));

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let templates = vec![template("SedanVehicle"), template("Lab"), template("TruckVehicle")];

        let start = Instant::now();
        let count = prepare_templates(&ops, &identifier, &pacer(), &templates, None).await;

        assert_eq!(count, 2);
        assert!(start.elapsed() >= full_cooldown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_deprecated_templates_need_no_wait() {
        let mut ops = MockFleetOperations::new();
        ops.expect_deprecate_template().never();

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let an_hour_ago = (Utc::now() - chrono::Duration::hours(1)).timestamp();
        let templates = vec![
            template("SUVVehicle")
                .with_attr(attr::DEPRECATED, "true")
                .with_attr(attr::DEPRECATED_AT, an_hour_ago.to_string()),
        ];

        let start = Instant::now();
        let count = prepare_templates(&ops, &identifier, &pacer(), &templates, None).await;

        assert_eq!(count, 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_deprecation_does_not_wait() {
        let mut ops = MockFleetOperations::new();
        ops.expect_deprecate_template()
            .returning(|_| Err(AwsError::other("access denied")));

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);

        let start = Instant::now();
        let count =
            prepare_templates(&ops, &identifier, &pacer(), &[template("SedanVehicle")], None).await;

        assert_eq!(count, 0);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_the_wait_short() {
        let mut ops = MockFleetOperations::new();
        ops.expect_deprecate_template().returning(|_| Ok(()));

        let rules = NamingRules::default();
        let identifier = Identifier::new(&ops, &rules);
        let token = CancellationToken::new();
        token.cancel();

        let start = Instant::now();
        prepare_templates(&ops, &identifier, &pacer(), &[template("SedanVehicle")], Some(&token))
            .await;

        assert!(start.elapsed() < full_cooldown());
    }
}
