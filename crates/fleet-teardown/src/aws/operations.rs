//! Fleet operation traits for testing
//!
//! The teardown engine talks to the provider only through these traits.
//! `AwsFleet` implements them over the AWS SDK; tests substitute mocks or
//! the in-memory fleet from `fleet-teardown-test-utils`.
//!
//! Note: Some parameters use `Option<String>` / `Vec<_>` instead of borrowed
//! forms to work around mockall lifetime limitations.

use super::error::AwsResult;
use crate::resource::Resource;
use anyhow::Result;
use fleet_teardown_common::ResourceKind;
use std::collections::HashMap;

/// One object version or delete marker inside a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub key: String,
    pub version_id: Option<String>,
}

/// Continuation point of a paginated object-version listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMarker {
    pub key_marker: String,
    pub version_id_marker: Option<String>,
}

/// One page of object versions and delete markers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectVersionPage {
    pub objects: Vec<ObjectRef>,
    /// Where the next page starts; `None` on the last page
    pub next: Option<VersionMarker>,
}

/// Deployment job status as far as teardown cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Scheduled,
    InProgress,
    Canceled,
    Completed,
    DeletionInProgress,
    Unknown,
}

impl JobStatus {
    /// Queued or running jobs must be cancelled before deletion
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Scheduled | JobStatus::InProgress)
    }
}

/// Atomic provider calls consumed by the teardown engine.
///
/// Every mutating method is a single remote call. A `NotFound` error means
/// the target is already gone.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait FleetOperations: Send + Sync {
    // Identification

    /// Resolve the identity reference (ARN) of a resource from its name
    async fn lookup_reference(&self, kind: ResourceKind, name: &str) -> AwsResult<String>;

    /// Fetch the tags of a resource by identity reference
    async fn resource_tags(
        &self,
        kind: ResourceKind,
        reference: &str,
    ) -> AwsResult<HashMap<String, String>>;

    /// Names of the devices a certificate is attached to
    async fn certificate_devices(&self, certificate_arn: &str) -> AwsResult<Vec<String>>;

    // Devices and their dependents

    async fn list_named_shadows(&self, device: &str) -> AwsResult<Vec<String>>;

    /// Delete a named shadow, or the classic shadow when `shadow` is `None`
    async fn delete_shadow(&self, device: &str, shadow: Option<String>) -> AwsResult<()>;

    /// Certificate ARNs attached to a device
    async fn list_device_certificates(&self, device: &str) -> AwsResult<Vec<String>>;

    async fn detach_certificate(&self, device: &str, certificate_arn: &str) -> AwsResult<()>;

    async fn deactivate_certificate(&self, certificate_id: &str) -> AwsResult<()>;

    async fn delete_certificate(&self, certificate_id: &str) -> AwsResult<()>;

    async fn delete_device(&self, device: &str) -> AwsResult<()>;

    // Groups

    /// Probe a group: `true` when it has a live query filter (dynamic)
    async fn is_dynamic_group(&self, group: &str) -> AwsResult<bool>;

    async fn list_group_members(&self, group: &str) -> AwsResult<Vec<String>>;

    async fn remove_group_member(&self, group: &str, device: &str) -> AwsResult<()>;

    async fn delete_static_group(&self, group: &str) -> AwsResult<()>;

    async fn delete_dynamic_group(&self, group: &str) -> AwsResult<()>;

    // Packages

    async fn list_package_versions(&self, package: &str) -> AwsResult<Vec<String>>;

    async fn delete_package_version(&self, package: &str, version: &str) -> AwsResult<()>;

    async fn delete_package(&self, package: &str) -> AwsResult<()>;

    // Storage

    /// One page of object versions and delete markers
    async fn list_object_versions(
        &self,
        bucket: &str,
        from: Option<VersionMarker>,
    ) -> AwsResult<ObjectVersionPage>;

    /// Delete up to 1000 object versions in one call, returning how many
    /// were removed
    async fn delete_objects(&self, bucket: &str, objects: Vec<ObjectRef>) -> AwsResult<usize>;

    async fn delete_bucket(&self, bucket: &str) -> AwsResult<()>;

    // Access roles

    async fn list_inline_policies(&self, role: &str) -> AwsResult<Vec<String>>;

    async fn delete_inline_policy(&self, role: &str, policy: &str) -> AwsResult<()>;

    async fn list_attached_policies(&self, role: &str) -> AwsResult<Vec<String>>;

    async fn detach_policy(&self, role: &str, policy_arn: &str) -> AwsResult<()>;

    async fn delete_role(&self, role: &str) -> AwsResult<()>;

    // Jobs

    async fn job_status(&self, job: &str) -> AwsResult<JobStatus>;

    async fn cancel_job(&self, job: &str) -> AwsResult<()>;

    /// Force-delete a job
    async fn delete_job(&self, job: &str) -> AwsResult<()>;

    // Templates and commands

    async fn deprecate_template(&self, template: &str) -> AwsResult<()>;

    async fn delete_template(&self, template: &str) -> AwsResult<()>;

    async fn delete_command(&self, command: &str) -> AwsResult<()>;

    // Account settings

    async fn disable_package_configuration(&self) -> AwsResult<()>;

    async fn disable_fleet_indexing(&self) -> AwsResult<()>;
}

/// Per-kind listing of live resources.
///
/// Pagination is the lister's concern; callers receive complete batches.
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait ResourceLister: Send + Sync {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>>;
}
