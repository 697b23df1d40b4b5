//! Resource discovery
//!
//! Lists the live resources of one category, following every page. Listings
//! return what the provider hands back cheaply; tags are fetched later by
//! the identifier only for resources that need them.

use super::fleet::AwsFleet;
use super::operations::{FleetOperations, ResourceLister};
use crate::resource::{Resource, attr};
use anyhow::{Context, Result};
use aws_sdk_iot::error::ProvideErrorMetadata;
use fleet_teardown_common::ResourceKind;
use tracing::debug;

/// Name given to the record of a device's classic shadow
const CLASSIC_SHADOW: &str = "classic";

impl ResourceLister for AwsFleet {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>> {
        let resources = match kind {
            ResourceKind::DeviceState => self.list_device_states().await,
            ResourceKind::Certificate => self.list_certificates().await,
            ResourceKind::Device => self.list_devices().await,
            ResourceKind::DeviceGroup => self.list_groups().await,
            ResourceKind::Command => self.list_commands().await,
            ResourceKind::Job => self.list_jobs().await,
            ResourceKind::Package => self.list_packages().await,
            ResourceKind::StorageBucket => self.list_buckets().await,
            ResourceKind::AccessRole => self.list_roles().await,
            ResourceKind::DeviceTypeTemplate => self.list_templates().await,
        }
        .with_context(|| format!("Failed to list {kind} resources"))?;

        debug!(kind = %kind, count = resources.len(), "Listed resources");
        Ok(resources)
    }
}

impl AwsFleet {
    async fn device_names(&self) -> Result<Vec<String>> {
        Ok(self
            .list_devices()
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }

    async fn list_devices(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_things()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("ListThings")?;
            for thing in response.things() {
                let Some(name) = thing.thing_name() else {
                    continue;
                };
                let mut resource = Resource::new(ResourceKind::Device, name);
                if let Some(arn) = thing.thing_arn() {
                    resource = resource.with_arn(arn);
                }
                resources.push(resource);
            }
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    /// Named shadows of every device, plus each classic shadow that exists
    async fn list_device_states(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        for device in self.device_names().await? {
            let mut next_token: Option<String> = None;
            loop {
                let response = match self
                    .iot_data
                    .list_named_shadows_for_thing()
                    .thing_name(&device)
                    .set_next_token(next_token.take())
                    .send()
                    .await
                {
                    Ok(response) => response,
                    // Device deleted between the two listings
                    Err(e) if e.code() == Some("ResourceNotFoundException") => break,
                    Err(e) => {
                        return Err(e).with_context(|| format!("ListNamedShadowsForThing {device}"));
                    }
                };
                for shadow in response.results() {
                    resources.push(
                        Resource::new(ResourceKind::DeviceState, format!("{device}/{shadow}"))
                            .with_attr(attr::OWNER, device.as_str())
                            .with_attr(attr::SHADOW, shadow.as_str()),
                    );
                }
                match response.next_token() {
                    Some(token) => next_token = Some(token.to_string()),
                    None => break,
                }
            }

            if self.has_classic_shadow(&device).await? {
                resources.push(
                    Resource::new(
                        ResourceKind::DeviceState,
                        format!("{device}/{CLASSIC_SHADOW}"),
                    )
                    .with_attr(attr::OWNER, device.as_str()),
                );
            }
        }
        Ok(resources)
    }

    async fn has_classic_shadow(&self, device: &str) -> Result<bool> {
        match self
            .iot_data
            .get_thing_shadow()
            .thing_name(device)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.code() == Some("ResourceNotFoundException") => Ok(false),
            Err(e) => Err(e).with_context(|| format!("GetThingShadow {device}")),
        }
    }

    async fn list_certificates(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_certificates()
                .set_marker(marker.take())
                .send()
                .await
                .context("ListCertificates")?;
            for cert in response.certificates() {
                let (Some(id), Some(arn)) = (cert.certificate_id(), cert.certificate_arn()) else {
                    continue;
                };
                let mut resource = Resource::new(ResourceKind::Certificate, id)
                    .with_arn(arn)
                    .with_attr(attr::CERTIFICATE_ID, id);
                if let Some(status) = cert.status() {
                    resource = resource.with_attr(attr::STATUS, status.as_str());
                }
                resources.push(resource);
            }
            match response.next_marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    async fn list_groups(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_thing_groups()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("ListThingGroups")?;
            for group in response.thing_groups() {
                let Some(name) = group.group_name() else {
                    continue;
                };
                let mut resource = Resource::new(ResourceKind::DeviceGroup, name);
                if let Some(arn) = group.group_arn() {
                    resource = resource.with_arn(arn);
                }
                // Recorded so the group recipe still knows the type if its own probe fails
                match self.is_dynamic_group(name).await {
                    Ok(dynamic) => {
                        resource = resource.with_attr(attr::QUERY_FILTER, dynamic.to_string());
                    }
                    Err(e) => debug!(group = %name, error = %e, "Could not read group type"),
                }
                resources.push(resource);
            }
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    async fn list_commands(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_commands()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("ListCommands")?;
            for command in response.commands() {
                let Some(id) = command.command_id() else {
                    continue;
                };
                let mut resource = Resource::new(ResourceKind::Command, id);
                if let Some(arn) = command.command_arn() {
                    resource = resource.with_arn(arn);
                }
                resources.push(resource);
            }
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    async fn list_jobs(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_jobs()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("ListJobs")?;
            for job in response.jobs() {
                let Some(id) = job.job_id() else {
                    continue;
                };
                let mut resource = Resource::new(ResourceKind::Job, id);
                if let Some(arn) = job.job_arn() {
                    resource = resource.with_arn(arn);
                }
                resources.push(resource);
            }
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    /// Packages come back without an ARN; the identifier looks it up
    async fn list_packages(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_packages()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("ListPackages")?;
            resources.extend(
                response
                    .package_summaries()
                    .iter()
                    .filter_map(|p| p.package_name())
                    .map(|name| Resource::new(ResourceKind::Package, name)),
            );
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    async fn list_buckets(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let response = self
                .s3
                .list_buckets()
                .set_continuation_token(continuation.take())
                .send()
                .await
                .context("ListBuckets")?;
            resources.extend(
                response
                    .buckets()
                    .iter()
                    .filter_map(|b| b.name())
                    .map(|name| Resource::new(ResourceKind::StorageBucket, name)),
            );
            match response.continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    async fn list_roles(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let response = self
                .iam
                .list_roles()
                .set_marker(marker.take())
                .send()
                .await
                .context("ListRoles")?;
            resources.extend(
                response
                    .roles()
                    .iter()
                    .map(|r| Resource::new(ResourceKind::AccessRole, r.role_name()).with_arn(r.arn())),
            );
            if response.is_truncated() {
                marker = response.marker().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(resources)
    }

    /// Templates carry their deprecation state for the cool-down planner
    async fn list_templates(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .iot
                .list_thing_types()
                .set_next_token(next_token.take())
                .send()
                .await
                .context("ListThingTypes")?;
            for template in response.thing_types() {
                let Some(name) = template.thing_type_name() else {
                    continue;
                };
                let mut resource = Resource::new(ResourceKind::DeviceTypeTemplate, name);
                if let Some(arn) = template.thing_type_arn() {
                    resource = resource.with_arn(arn);
                }
                if let Some(meta) = template.thing_type_metadata() {
                    resource = resource.with_attr(attr::DEPRECATED, meta.deprecated().to_string());
                    if let Some(at) = meta.deprecation_date() {
                        resource = resource.with_attr(attr::DEPRECATED_AT, at.secs().to_string());
                    }
                }
                resources.push(resource);
            }
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }
}
