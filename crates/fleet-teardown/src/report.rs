//! Teardown report and its renderings
//!
//! The report is the audit trail of one run: per-category tallies in
//! cleanup order, categories that could not be listed, and the account
//! settings that were switched off.

use crate::identify::Classification;
use anyhow::Result;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use fleet_teardown_common::{CategoryStats, ResourceKind, SettingsToggle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of a whole teardown run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    /// Per-category tallies; `ResourceKind` ordering is cleanup order
    pub categories: BTreeMap<ResourceKind, CategoryStats>,
    /// Categories whose listing failed (reported with zero counts)
    pub unlisted: Vec<ResourceKind>,
    /// Account settings switched off during the run
    pub settings_applied: Vec<SettingsToggle>,
    /// Stopped early on user request
    pub interrupted: bool,
    #[serde(rename = "elapsed_seconds", serialize_with = "as_seconds")]
    pub elapsed: Duration,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn as_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl CleanupReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn record(&mut self, kind: ResourceKind, stats: CategoryStats) {
        self.categories.insert(kind, stats);
    }

    pub fn record_unlisted(&mut self, kind: ResourceKind) {
        self.categories.insert(kind, CategoryStats::default());
        self.unlisted.push(kind);
    }

    pub fn total_deleted(&self) -> usize {
        self.categories.values().map(|s| s.deleted).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.categories.values().map(|s| s.failed).sum()
    }

    /// True when nothing failed and every category could be listed
    pub fn is_clean(&self) -> bool {
        self.total_failed() == 0 && self.unlisted.is_empty() && !self.interrupted
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the per-category summary table
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Category"),
                Cell::new("Total"),
                Cell::new(if self.dry_run { "Would delete" } else { "Deleted" }),
                Cell::new("Skipped"),
                Cell::new("Failed"),
            ]);

        for (kind, stats) in &self.categories {
            let total = if self.unlisted.contains(kind) {
                "listing failed".to_string()
            } else {
                stats.total.to_string()
            };
            table.add_row(vec![
                Cell::new(kind.as_str()),
                Cell::new(&total),
                Cell::new(stats.deleted),
                Cell::new(stats.skipped),
                Cell::new(stats.failed),
            ]);
        }
        table
    }
}

/// One row of a scan: a resource and how it was classified
#[derive(Debug, Clone, Serialize)]
pub struct ScanRow {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(flatten)]
    pub classification: Classification,
}

pub fn scan_table(rows: &[ScanRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Category"),
            Cell::new("Name"),
            Cell::new("Fleet-owned"),
            Cell::new("Method"),
        ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.kind.as_str()),
            Cell::new(&row.name),
            Cell::new(if row.classification.is_fleet_owned { "yes" } else { "no" }),
            Cell::new(row.classification.method),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identify::Method;

    fn sample() -> CleanupReport {
        let mut report = CleanupReport::new(false);
        report.record(
            ResourceKind::Device,
            CategoryStats {
                total: 5,
                deleted: 4,
                skipped: 0,
                failed: 1,
                skipped_names: vec![],
            },
        );
        report.record_unlisted(ResourceKind::StorageBucket);
        report.record(ResourceKind::DeviceState, CategoryStats::new(0));
        report.elapsed = Duration::from_millis(1500);
        report
    }

    #[test]
    fn test_categories_in_cleanup_order() {
        let report = sample();
        let kinds: Vec<_> = report.categories.keys().copied().collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::DeviceState,
                ResourceKind::Device,
                ResourceKind::StorageBucket
            ]
        );
        assert_eq!(report.total_deleted(), 4);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["categories"]["device"]["deleted"], 4);
        assert_eq!(json["unlisted"][0], "storage-bucket");
        assert_eq!(json["elapsed_seconds"], 1.5);
        assert_eq!(json["dry_run"], false);
    }

    #[test]
    fn test_table_marks_unlisted() {
        let rendered = sample().to_table().to_string();
        assert!(rendered.contains("listing failed"));
        assert!(rendered.contains("device-state"));
    }

    #[test]
    fn test_scan_rows() {
        let rows = vec![ScanRow {
            kind: ResourceKind::Device,
            name: "Vehicle-VIN-001".into(),
            classification: Classification::owned(Method::Naming),
        }];
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["method"], "naming");
        assert_eq!(json[0]["is_fleet_owned"], true);
        assert!(scan_table(&rows).to_string().contains("naming"));
    }
}
