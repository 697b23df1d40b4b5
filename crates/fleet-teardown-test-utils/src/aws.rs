//! AWS test utilities
//!
//! Provides region detection and unique name generation for AWS integration
//! tests.

use chrono::Utc;

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Generate a unique run ID for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`, unique even when tests start
/// simultaneously.
///
/// # Example
///
/// ```
/// use fleet_teardown_test_utils::aws::test_run_id;
///
/// let run_id = test_run_id();
/// assert!(run_id.starts_with("test-"));
/// ```
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{ts}-{counter}")
}

/// Device prefix unique to one test run, for use with `--prefix`.
///
/// Devices named `{prefix}{n}` match only this run's custom naming rule.
pub fn test_device_prefix() -> String {
    format!("TestVehicle-{}-", Utc::now().timestamp_millis())
}
