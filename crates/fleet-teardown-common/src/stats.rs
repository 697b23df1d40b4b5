//! Per-category deletion statistics
//!
//! Provides `CategoryStats`, the tally one orchestrator pass hands to the
//! reporter.

use serde::Serialize;

/// Outcome counts for one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    /// Number of resources in the batch
    pub total: usize,
    /// Fleet-owned resources removed (or already gone)
    pub deleted: usize,
    /// Resources not identified as fleet-owned
    pub skipped: usize,
    /// Fleet-owned resources whose deletion failed
    pub failed: usize,
    /// Names of the skipped resources, for the audit trail
    pub skipped_names: Vec<String>,
}

impl CategoryStats {
    /// Start a tally for a batch of `total` resources
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record_deleted(&mut self) {
        self.deleted += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub fn record_skipped(&mut self, name: impl Into<String>) {
        self.skipped += 1;
        self.skipped_names.push(name.into());
    }

    /// Number of resources that reached a final outcome
    pub fn processed(&self) -> usize {
        self.deleted + self.skipped + self.failed
    }

    /// Whether every resource in the batch has been accounted for
    pub fn is_complete(&self) -> bool {
        self.processed() == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fixes_total() {
        let stats = CategoryStats::new(5);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.processed(), 0);
        assert!(!stats.is_complete());
    }

    #[test]
    fn test_record_outcomes() {
        let mut stats = CategoryStats::new(3);
        stats.record_deleted();
        stats.record_failed();
        stats.record_skipped("other-thing");

        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.skipped_names, vec!["other-thing".to_string()]);
        assert!(stats.is_complete());
    }

    #[test]
    fn test_empty_batch_is_complete() {
        assert!(CategoryStats::new(0).is_complete());
    }
}
