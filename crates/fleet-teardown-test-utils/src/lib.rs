//! Shared test utilities for fleet-teardown
//!
//! This crate provides common test helpers used by the engine's
//! integration tests.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique test name generation
//! - [`fake`]: In-memory fleet implementing the engine's provider traits

pub mod aws;
pub mod fake;

// Re-export commonly used items
pub use aws::{get_test_region, test_device_prefix, test_run_id};
pub use fake::{FakeFleet, certificate_arn};
