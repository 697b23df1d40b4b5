//! AWS binding for the teardown engine
//!
//! This module provides:
//! - context: shared SDK configuration and client construction
//! - account: STS account lookup
//! - error: error-code classification
//! - operations: the traits the engine is written against
//! - fleet / listing: `AwsFleet`, the SDK-backed implementation

pub mod account;
pub mod context;
pub mod error;
pub mod fleet;
pub mod listing;
pub mod operations;

pub use account::{AccountId, get_current_account_id};
pub use context::AwsContext;
pub use fleet::AwsFleet;

// Error handling
pub use error::{AwsError, AwsResult, classify_aws_error, classify_sdk_error, ignore_not_found};

// Engine seams
pub use operations::{
    FleetOperations, JobStatus, ObjectRef, ObjectVersionPage, ResourceLister, VersionMarker,
};

#[cfg(test)]
pub use operations::{MockFleetOperations, MockResourceLister};
