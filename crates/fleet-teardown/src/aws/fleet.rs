//! AWS-backed fleet operations
//!
//! Each `FleetOperations` method is one SDK call (plus pagination for the
//! listing helpers). Errors are classified by error code so the engine can
//! tell "already gone" from real failures.

use super::context::AwsContext;
use super::error::{AwsError, AwsResult, classify_sdk_error};
use super::operations::{FleetOperations, JobStatus, ObjectRef, ObjectVersionPage, VersionMarker};
use anyhow::Result;
use aws_sdk_iot::error::ProvideErrorMetadata;
use aws_sdk_iot::types::{
    CertificateStatus, ThingGroupIndexingConfiguration, ThingGroupIndexingMode,
    ThingIndexingConfiguration, ThingIndexingMode, VersionUpdateByJobsConfig,
};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use fleet_teardown_common::ResourceKind;
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::debug;

/// Map SDK failures onto `AwsError`
pub(crate) trait Classify<T> {
    fn classify(self) -> AwsResult<T>;
}

impl<T, E: ProvideErrorMetadata + Debug> Classify<T> for Result<T, E> {
    fn classify(self) -> AwsResult<T> {
        self.map_err(|e| classify_sdk_error(&e))
    }
}

fn build_error(e: impl std::fmt::Display) -> AwsError {
    AwsError::other(format!("invalid request: {e}"))
}

/// Role name from either a role name or a role ARN
fn role_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// AWS clients for one account and region
#[derive(Clone, Debug)]
pub struct AwsFleet {
    pub(super) iot: aws_sdk_iot::Client,
    pub(super) iot_data: aws_sdk_iotdataplane::Client,
    pub(super) s3: aws_sdk_s3::Client,
    pub(super) iam: aws_sdk_iam::Client,
}

impl AwsFleet {
    /// Build every client, discovering the data-plane endpoint
    pub async fn connect(ctx: &AwsContext) -> Result<Self> {
        Ok(Self {
            iot: ctx.iot_client(),
            iot_data: ctx.iot_data_client().await?,
            s3: ctx.s3_client(),
            iam: ctx.iam_client(),
        })
    }

    async fn iot_tags(&self, arn: &str) -> AwsResult<HashMap<String, String>> {
        let mut tags = HashMap::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_tags_for_resource()
                .resource_arn(arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;
            for tag in response.tags() {
                tags.insert(
                    tag.key().to_string(),
                    tag.value().unwrap_or_default().to_string(),
                );
            }
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(tags)
    }

    async fn bucket_tags(&self, bucket: &str) -> AwsResult<HashMap<String, String>> {
        match self.s3.get_bucket_tagging().bucket(bucket).send().await {
            Ok(response) => Ok(response
                .tag_set()
                .iter()
                .map(|t| (t.key().to_string(), t.value().to_string()))
                .collect()),
            // An untagged bucket reports NoSuchTagSet
            Err(e) if e.code() == Some("NoSuchTagSet") => Ok(HashMap::new()),
            Err(e) => Err(classify_sdk_error(&e)),
        }
    }

    async fn role_tags(&self, role: &str) -> AwsResult<HashMap<String, String>> {
        let response = self
            .iam
            .list_role_tags()
            .role_name(role_name(role))
            .send()
            .await
            .classify()?;
        Ok(response
            .tags()
            .iter()
            .map(|t| (t.key().to_string(), t.value().to_string()))
            .collect())
    }
}

impl FleetOperations for AwsFleet {
    async fn lookup_reference(&self, kind: ResourceKind, name: &str) -> AwsResult<String> {
        let arn = match kind {
            ResourceKind::Package => self
                .iot
                .get_package()
                .package_name(name)
                .send()
                .await
                .classify()?
                .package_arn()
                .map(str::to_string),
            ResourceKind::AccessRole => self
                .iam
                .get_role()
                .role_name(name)
                .send()
                .await
                .classify()?
                .role()
                .map(|r| r.arn().to_string()),
            ResourceKind::Device => self
                .iot
                .describe_thing()
                .thing_name(name)
                .send()
                .await
                .classify()?
                .thing_arn()
                .map(str::to_string),
            ResourceKind::DeviceGroup => self
                .iot
                .describe_thing_group()
                .thing_group_name(name)
                .send()
                .await
                .classify()?
                .thing_group_arn()
                .map(str::to_string),
            ResourceKind::DeviceTypeTemplate => self
                .iot
                .describe_thing_type()
                .thing_type_name(name)
                .send()
                .await
                .classify()?
                .thing_type_arn()
                .map(str::to_string),
            ResourceKind::Job => self
                .iot
                .describe_job()
                .job_id(name)
                .send()
                .await
                .classify()?
                .job()
                .and_then(|j| j.job_arn())
                .map(str::to_string),
            ResourceKind::Command => self
                .iot
                .get_command()
                .command_id(name)
                .send()
                .await
                .classify()?
                .command_arn()
                .map(str::to_string),
            // Buckets are addressed by name
            ResourceKind::StorageBucket => Some(name.to_string()),
            ResourceKind::Certificate | ResourceKind::DeviceState => None,
        };
        arn.ok_or_else(|| AwsError::other(format!("no identity reference for {kind} {name}")))
    }

    async fn resource_tags(
        &self,
        kind: ResourceKind,
        reference: &str,
    ) -> AwsResult<HashMap<String, String>> {
        match kind {
            ResourceKind::StorageBucket => self.bucket_tags(reference).await,
            ResourceKind::AccessRole => self.role_tags(reference).await,
            _ => self.iot_tags(reference).await,
        }
    }

    async fn certificate_devices(&self, certificate_arn: &str) -> AwsResult<Vec<String>> {
        let mut devices = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_principal_things()
                .principal(certificate_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;
            devices.extend(response.things().iter().cloned());
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(devices)
    }

    async fn list_named_shadows(&self, device: &str) -> AwsResult<Vec<String>> {
        let mut shadows = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot_data
                .list_named_shadows_for_thing()
                .thing_name(device)
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;
            shadows.extend(response.results().iter().cloned());
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(shadows)
    }

    async fn delete_shadow(&self, device: &str, shadow: Option<String>) -> AwsResult<()> {
        self.iot_data
            .delete_thing_shadow()
            .thing_name(device)
            .set_shadow_name(shadow)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn list_device_certificates(&self, device: &str) -> AwsResult<Vec<String>> {
        let mut principals = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_thing_principals()
                .thing_name(device)
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;
            principals.extend(
                response
                    .principals()
                    .iter()
                    .filter(|p| p.contains(":cert/"))
                    .cloned(),
            );
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(principals)
    }

    async fn detach_certificate(&self, device: &str, certificate_arn: &str) -> AwsResult<()> {
        self.iot
            .detach_thing_principal()
            .thing_name(device)
            .principal(certificate_arn)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn deactivate_certificate(&self, certificate_id: &str) -> AwsResult<()> {
        self.iot
            .update_certificate()
            .certificate_id(certificate_id)
            .new_status(CertificateStatus::Inactive)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_certificate(&self, certificate_id: &str) -> AwsResult<()> {
        self.iot
            .delete_certificate()
            .certificate_id(certificate_id)
            .force_delete(true)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_device(&self, device: &str) -> AwsResult<()> {
        self.iot
            .delete_thing()
            .thing_name(device)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn is_dynamic_group(&self, group: &str) -> AwsResult<bool> {
        let response = self
            .iot
            .describe_thing_group()
            .thing_group_name(group)
            .send()
            .await
            .classify()?;
        Ok(response.query_string().is_some_and(|q| !q.is_empty()))
    }

    async fn list_group_members(&self, group: &str) -> AwsResult<Vec<String>> {
        let mut members = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_things_in_thing_group()
                .thing_group_name(group)
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;
            members.extend(response.things().iter().cloned());
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(members)
    }

    async fn remove_group_member(&self, group: &str, device: &str) -> AwsResult<()> {
        self.iot
            .remove_thing_from_thing_group()
            .thing_group_name(group)
            .thing_name(device)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_static_group(&self, group: &str) -> AwsResult<()> {
        self.iot
            .delete_thing_group()
            .thing_group_name(group)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_dynamic_group(&self, group: &str) -> AwsResult<()> {
        self.iot
            .delete_dynamic_thing_group()
            .thing_group_name(group)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn list_package_versions(&self, package: &str) -> AwsResult<Vec<String>> {
        let mut versions = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_package_versions()
                .package_name(package)
                .set_next_token(next_token.take())
                .send()
                .await
                .classify()?;
            versions.extend(
                response
                    .package_version_summaries()
                    .iter()
                    .filter_map(|v| v.version_name().map(str::to_string)),
            );
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(versions)
    }

    async fn delete_package_version(&self, package: &str, version: &str) -> AwsResult<()> {
        self.iot
            .delete_package_version()
            .package_name(package)
            .version_name(version)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_package(&self, package: &str) -> AwsResult<()> {
        self.iot
            .delete_package()
            .package_name(package)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        from: Option<VersionMarker>,
    ) -> AwsResult<ObjectVersionPage> {
        let (key_marker, version_id_marker) = match from {
            Some(marker) => (Some(marker.key_marker), marker.version_id_marker),
            None => (None, None),
        };
        let response = self
            .s3
            .list_object_versions()
            .bucket(bucket)
            .set_key_marker(key_marker)
            .set_version_id_marker(version_id_marker)
            .send()
            .await
            .classify()?;

        let versions = response.versions().iter().filter_map(|v| {
            v.key().map(|key| ObjectRef {
                key: key.to_string(),
                version_id: v.version_id().map(str::to_string),
            })
        });
        let markers = response.delete_markers().iter().filter_map(|m| {
            m.key().map(|key| ObjectRef {
                key: key.to_string(),
                version_id: m.version_id().map(str::to_string),
            })
        });
        let objects = versions.chain(markers).collect();

        let next = match (response.is_truncated(), response.next_key_marker()) {
            (Some(true), Some(key)) => Some(VersionMarker {
                key_marker: key.to_string(),
                version_id_marker: response.next_version_id_marker().map(str::to_string),
            }),
            _ => None,
        };
        Ok(ObjectVersionPage { objects, next })
    }

    async fn delete_objects(&self, bucket: &str, objects: Vec<ObjectRef>) -> AwsResult<usize> {
        let requested = objects.len();
        let identifiers = objects
            .into_iter()
            .map(|o| {
                ObjectIdentifier::builder()
                    .key(o.key)
                    .set_version_id(o.version_id)
                    .build()
                    .map_err(build_error)
            })
            .collect::<AwsResult<Vec<_>>>()?;
        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(build_error)?;

        let response = self
            .s3
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .classify()?;

        // Quiet mode only reports failures
        let errors = response.errors();
        if let Some(first) = errors.first() {
            return Err(AwsError::PartialBatch {
                requested,
                failed: errors.len(),
                first_error: first
                    .message()
                    .or(first.code())
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
        debug!(bucket = %bucket, count = requested, "Deleted object versions");
        Ok(requested)
    }

    async fn delete_bucket(&self, bucket: &str) -> AwsResult<()> {
        self.s3.delete_bucket().bucket(bucket).send().await.classify()?;
        Ok(())
    }

    async fn list_inline_policies(&self, role: &str) -> AwsResult<Vec<String>> {
        let mut policies = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .iam
                .list_role_policies()
                .role_name(role)
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;
            policies.extend(response.policy_names().iter().cloned());
            if response.is_truncated() {
                marker = response.marker().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(policies)
    }

    async fn delete_inline_policy(&self, role: &str, policy: &str) -> AwsResult<()> {
        self.iam
            .delete_role_policy()
            .role_name(role)
            .policy_name(policy)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn list_attached_policies(&self, role: &str) -> AwsResult<Vec<String>> {
        let mut arns = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .iam
                .list_attached_role_policies()
                .role_name(role)
                .set_marker(marker.take())
                .send()
                .await
                .classify()?;
            arns.extend(
                response
                    .attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );
            if response.is_truncated() {
                marker = response.marker().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(arns)
    }

    async fn detach_policy(&self, role: &str, policy_arn: &str) -> AwsResult<()> {
        self.iam
            .detach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_role(&self, role: &str) -> AwsResult<()> {
        self.iam.delete_role().role_name(role).send().await.classify()?;
        Ok(())
    }

    async fn job_status(&self, job: &str) -> AwsResult<JobStatus> {
        use aws_sdk_iot::types::JobStatus as SdkJobStatus;

        let response = self.iot.describe_job().job_id(job).send().await.classify()?;
        let status = match response.job().and_then(|j| j.status()) {
            Some(SdkJobStatus::Scheduled) => JobStatus::Scheduled,
            Some(SdkJobStatus::InProgress) => JobStatus::InProgress,
            Some(SdkJobStatus::Canceled) => JobStatus::Canceled,
            Some(SdkJobStatus::Completed) => JobStatus::Completed,
            Some(SdkJobStatus::DeletionInProgress) => JobStatus::DeletionInProgress,
            _ => JobStatus::Unknown,
        };
        Ok(status)
    }

    async fn cancel_job(&self, job: &str) -> AwsResult<()> {
        self.iot
            .cancel_job()
            .job_id(job)
            .force(true)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_job(&self, job: &str) -> AwsResult<()> {
        self.iot
            .delete_job()
            .job_id(job)
            .force(true)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn deprecate_template(&self, template: &str) -> AwsResult<()> {
        self.iot
            .deprecate_thing_type()
            .thing_type_name(template)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_template(&self, template: &str) -> AwsResult<()> {
        self.iot
            .delete_thing_type()
            .thing_type_name(template)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn delete_command(&self, command: &str) -> AwsResult<()> {
        self.iot
            .delete_command()
            .command_id(command)
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn disable_package_configuration(&self) -> AwsResult<()> {
        self.iot
            .update_package_configuration()
            .version_update_by_jobs_config(VersionUpdateByJobsConfig::builder().enabled(false).build())
            .send()
            .await
            .classify()?;
        Ok(())
    }

    async fn disable_fleet_indexing(&self) -> AwsResult<()> {
        let things = ThingIndexingConfiguration::builder()
            .thing_indexing_mode(ThingIndexingMode::Off)
            .build()
            .map_err(build_error)?;
        let groups = ThingGroupIndexingConfiguration::builder()
            .thing_group_indexing_mode(ThingGroupIndexingMode::Off)
            .build()
            .map_err(build_error)?;
        self.iot
            .update_indexing_configuration()
            .thing_indexing_configuration(things)
            .thing_group_indexing_configuration(groups)
            .send()
            .await
            .classify()?;
        Ok(())
    }
}
