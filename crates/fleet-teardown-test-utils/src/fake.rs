//! In-memory fleet
//!
//! `FakeFleet` implements both engine traits over a small model of the
//! provider. It enforces the ordering rules the real provider enforces
//! (attached certificates block device deletion, active certificates cannot
//! be deleted, non-empty buckets and roles with policies are refused) so
//! tests notice when a recipe runs steps in the wrong order.
//!
//! Every call is recorded. Failures and panics can be injected per
//! `(operation, target)` pair.

use fleet_teardown::aws::{
    AwsError, AwsResult, FleetOperations, JobStatus, ObjectRef, ObjectVersionPage, ResourceLister,
    VersionMarker,
};
use fleet_teardown::resource::{Resource, attr};
use fleet_teardown_common::ResourceKind;
use fleet_teardown_common::tags::{TAG_FLEET, TAG_FLEET_VALUE};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

const ACCOUNT: &str = "123456789012";
const REGION: &str = "us-east-1";

/// Objects returned per version-listing page
pub const FAKE_PAGE_SIZE: usize = 1000;

/// Operations that change provider state
const MUTATING_PREFIXES: &[&str] = &[
    "delete_",
    "detach_",
    "deactivate_",
    "remove_",
    "cancel_",
    "deprecate_",
    "disable_",
];

/// Certificate ARN for a certificate id
pub fn certificate_arn(id: &str) -> String {
    format!("arn:aws:iot:{REGION}:{ACCOUNT}:cert/{id}")
}

fn fake_arn(kind: ResourceKind, name: &str) -> String {
    format!("arn:aws:iot:{REGION}:{ACCOUNT}:{kind}/{name}")
}

fn marker_tags() -> HashMap<String, String> {
    HashMap::from([(TAG_FLEET.to_string(), TAG_FLEET_VALUE.to_string())])
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(what: impl std::fmt::Display) -> AwsError {
    AwsError::NotFound(format!("{what} does not exist"))
}

#[derive(Debug, Default)]
struct DeviceEntry {
    named_shadows: BTreeSet<String>,
    classic_shadow: bool,
    certificates: BTreeSet<String>,
}

#[derive(Debug)]
struct CertEntry {
    active: bool,
}

#[derive(Debug, Default)]
struct GroupEntry {
    dynamic: bool,
    members: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct RoleEntry {
    inline: BTreeSet<String>,
    attached: BTreeSet<String>,
}

#[derive(Debug)]
struct JobEntry {
    status: JobStatus,
    /// Status reads that still report the job as running after a cancel
    cancel_lag: u32,
    cancel_requested: bool,
}

#[derive(Debug)]
struct FleetState {
    devices: BTreeMap<String, DeviceEntry>,
    certificates: BTreeMap<String, CertEntry>,
    groups: BTreeMap<String, GroupEntry>,
    packages: BTreeMap<String, BTreeSet<String>>,
    buckets: BTreeMap<String, Vec<ObjectRef>>,
    roles: BTreeMap<String, RoleEntry>,
    jobs: BTreeMap<String, JobEntry>,
    /// Deprecation time (epoch seconds) per template
    templates: BTreeMap<String, Option<i64>>,
    commands: BTreeSet<String>,
    tags: HashMap<(ResourceKind, String), HashMap<String, String>>,
    package_configuration_enabled: bool,
    fleet_indexing_enabled: bool,
}

impl Default for FleetState {
    fn default() -> Self {
        Self {
            devices: BTreeMap::new(),
            certificates: BTreeMap::new(),
            groups: BTreeMap::new(),
            packages: BTreeMap::new(),
            buckets: BTreeMap::new(),
            roles: BTreeMap::new(),
            jobs: BTreeMap::new(),
            templates: BTreeMap::new(),
            commands: BTreeSet::new(),
            tags: HashMap::new(),
            package_configuration_enabled: true,
            fleet_indexing_enabled: true,
        }
    }
}

impl FleetState {
    fn tag(&mut self, kind: ResourceKind, name: &str, tagged: bool) {
        if tagged {
            self.tags.insert((kind, name.to_string()), marker_tags());
        }
    }

    fn attached_devices(&self, certificate_arn: &str) -> Vec<String> {
        self.devices
            .iter()
            .filter(|(_, d)| d.certificates.contains(certificate_arn))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Injected {
    Fail,
    Panic,
}

/// In-memory provider for engine tests
#[derive(Debug, Default)]
pub struct FakeFleet {
    state: Mutex<FleetState>,
    calls: Mutex<Vec<String>>,
    injected: Mutex<HashMap<(String, String), Injected>>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding

    pub fn add_device(&self, name: &str, tagged: bool) {
        let mut state = lock(&self.state);
        state.devices.entry(name.to_string()).or_default();
        state.tag(ResourceKind::Device, name, tagged);
    }

    pub fn add_named_shadow(&self, device: &str, shadow: &str) {
        let mut state = lock(&self.state);
        state
            .devices
            .entry(device.to_string())
            .or_default()
            .named_shadows
            .insert(shadow.to_string());
    }

    pub fn add_classic_shadow(&self, device: &str) {
        lock(&self.state)
            .devices
            .entry(device.to_string())
            .or_default()
            .classic_shadow = true;
    }

    /// Create an active certificate attached to `device`, returning its ARN
    pub fn add_certificate(&self, device: &str, id: &str) -> String {
        let arn = certificate_arn(id);
        let mut state = lock(&self.state);
        state
            .certificates
            .insert(id.to_string(), CertEntry { active: true });
        state
            .devices
            .entry(device.to_string())
            .or_default()
            .certificates
            .insert(arn.clone());
        arn
    }

    pub fn add_group(&self, name: &str, dynamic: bool, tagged: bool, members: &[&str]) {
        let mut state = lock(&self.state);
        state.groups.insert(
            name.to_string(),
            GroupEntry {
                dynamic,
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        );
        state.tag(ResourceKind::DeviceGroup, name, tagged);
    }

    pub fn add_package(&self, name: &str, versions: &[&str], tagged: bool) {
        let mut state = lock(&self.state);
        state.packages.insert(
            name.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        state.tag(ResourceKind::Package, name, tagged);
    }

    /// Create a bucket holding `versions` object versions
    pub fn add_bucket(&self, name: &str, versions: usize, tagged: bool) {
        let objects = (0..versions)
            .map(|i| ObjectRef {
                key: format!("firmware/{:05}.bin", i / 2),
                version_id: Some(format!("v{i}")),
            })
            .collect();
        let mut state = lock(&self.state);
        state.buckets.insert(name.to_string(), objects);
        state.tag(ResourceKind::StorageBucket, name, tagged);
    }

    pub fn add_role(&self, name: &str, inline: &[&str], attached: &[&str], tagged: bool) {
        let mut state = lock(&self.state);
        state.roles.insert(
            name.to_string(),
            RoleEntry {
                inline: inline.iter().map(|p| p.to_string()).collect(),
                attached: attached.iter().map(|p| p.to_string()).collect(),
            },
        );
        state.tag(ResourceKind::AccessRole, name, tagged);
    }

    /// Create a job. A cancelled job keeps reporting `InProgress` for
    /// `cancel_lag` status reads.
    pub fn add_job(&self, id: &str, status: JobStatus, cancel_lag: u32, tagged: bool) {
        let mut state = lock(&self.state);
        state.jobs.insert(
            id.to_string(),
            JobEntry {
                status,
                cancel_lag,
                cancel_requested: false,
            },
        );
        state.tag(ResourceKind::Job, id, tagged);
    }

    /// Create a template, optionally already deprecated at `deprecated_at`
    pub fn add_template(&self, name: &str, deprecated_at: Option<i64>, tagged: bool) {
        let mut state = lock(&self.state);
        state.templates.insert(name.to_string(), deprecated_at);
        state.tag(ResourceKind::DeviceTypeTemplate, name, tagged);
    }

    pub fn add_command(&self, id: &str, tagged: bool) {
        let mut state = lock(&self.state);
        state.commands.insert(id.to_string());
        state.tag(ResourceKind::Command, id, tagged);
    }

    // Fault injection

    /// Make `operation` on `target` return an error
    pub fn fail_on(&self, operation: &str, target: &str) {
        lock(&self.injected).insert((operation.to_string(), target.to_string()), Injected::Fail);
    }

    /// Make `operation` on `target` panic
    pub fn panic_on(&self, operation: &str, target: &str) {
        lock(&self.injected).insert((operation.to_string(), target.to_string()), Injected::Panic);
    }

    // Inspection

    /// Whether a resource of `kind` named `name` still exists
    pub fn exists(&self, kind: ResourceKind, name: &str) -> bool {
        let state = lock(&self.state);
        match kind {
            ResourceKind::DeviceState => {
                let Some((device, shadow)) = name.split_once('/') else {
                    return false;
                };
                state.devices.get(device).is_some_and(|d| match shadow {
                    "classic" => d.classic_shadow,
                    named => d.named_shadows.contains(named),
                })
            }
            ResourceKind::Certificate => state.certificates.contains_key(name),
            ResourceKind::Device => state.devices.contains_key(name),
            ResourceKind::DeviceGroup => state.groups.contains_key(name),
            ResourceKind::Command => state.commands.contains(name),
            ResourceKind::Job => state.jobs.contains_key(name),
            ResourceKind::Package => state.packages.contains_key(name),
            ResourceKind::StorageBucket => state.buckets.contains_key(name),
            ResourceKind::AccessRole => state.roles.contains_key(name),
            ResourceKind::DeviceTypeTemplate => state.templates.contains_key(name),
        }
    }

    pub fn group_members(&self, group: &str) -> Vec<String> {
        lock(&self.state)
            .groups
            .get(group)
            .map(|g| g.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn settings_enabled(&self) -> (bool, bool) {
        let state = lock(&self.state);
        (
            state.package_configuration_enabled,
            state.fleet_indexing_enabled,
        )
    }

    /// Every call so far, as `"<operation> <target>"`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Calls that would have changed provider state
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| MUTATING_PREFIXES.iter().any(|p| c.starts_with(p)))
            .collect()
    }

    /// Calls of one operation, in order
    pub fn calls_of(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{operation} ");
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    /// Record a call and apply any injected fault. Never panics while a
    /// lock is held.
    fn enter(&self, operation: &str, target: &str) -> AwsResult<()> {
        lock(&self.calls).push(format!("{operation} {target}"));
        let injected = lock(&self.injected)
            .get(&(operation.to_string(), target.to_string()))
            .copied();
        match injected {
            Some(Injected::Panic) => panic!("injected panic in {operation} {target}"),
            Some(Injected::Fail) => Err(AwsError::other(format!(
                "injected failure in {operation} {target}"
            ))),
            None => Ok(()),
        }
    }

    fn list_kind(&self, kind: ResourceKind) -> Vec<Resource> {
        let state = lock(&self.state);
        match kind {
            ResourceKind::DeviceState => state
                .devices
                .iter()
                .flat_map(|(device, entry)| {
                    let named = entry.named_shadows.iter().map(move |shadow| {
                        Resource::new(kind, format!("{device}/{shadow}"))
                            .with_attr(attr::OWNER, device.as_str())
                            .with_attr(attr::SHADOW, shadow.as_str())
                    });
                    let classic = entry.classic_shadow.then(|| {
                        Resource::new(kind, format!("{device}/classic"))
                            .with_attr(attr::OWNER, device.as_str())
                    });
                    named.chain(classic)
                })
                .collect(),
            ResourceKind::Certificate => state
                .certificates
                .iter()
                .map(|(id, cert)| {
                    Resource::new(kind, id.as_str())
                        .with_arn(certificate_arn(id))
                        .with_attr(attr::CERTIFICATE_ID, id.as_str())
                        .with_attr(attr::STATUS, if cert.active { "ACTIVE" } else { "INACTIVE" })
                })
                .collect(),
            ResourceKind::Device => names_with_arn(kind, state.devices.keys()),
            ResourceKind::DeviceGroup => state
                .groups
                .iter()
                .map(|(name, group)| {
                    Resource::new(kind, name.as_str())
                        .with_arn(fake_arn(kind, name))
                        .with_attr(attr::QUERY_FILTER, group.dynamic.to_string())
                })
                .collect(),
            ResourceKind::Command => names_with_arn(kind, state.commands.iter()),
            ResourceKind::Job => names_with_arn(kind, state.jobs.keys()),
            // Listed without identity references, like the real provider
            ResourceKind::Package => state.packages.keys().map(|n| Resource::new(kind, n.as_str())).collect(),
            ResourceKind::AccessRole => state.roles.keys().map(|n| Resource::new(kind, n.as_str())).collect(),
            ResourceKind::StorageBucket => state.buckets.keys().map(|n| Resource::new(kind, n.as_str())).collect(),
            ResourceKind::DeviceTypeTemplate => state
                .templates
                .iter()
                .map(|(name, deprecated_at)| {
                    let resource = Resource::new(kind, name.as_str())
                        .with_arn(fake_arn(kind, name))
                        .with_attr(attr::DEPRECATED, deprecated_at.is_some().to_string());
                    match deprecated_at {
                        Some(at) => resource.with_attr(attr::DEPRECATED_AT, at.to_string()),
                        None => resource,
                    }
                })
                .collect(),
        }
    }
}

fn names_with_arn<'a>(kind: ResourceKind, names: impl Iterator<Item = &'a String>) -> Vec<Resource> {
    names
        .map(|name| Resource::new(kind, name.as_str()).with_arn(fake_arn(kind, name)))
        .collect()
}

impl ResourceLister for FakeFleet {
    async fn list(&self, kind: ResourceKind) -> anyhow::Result<Vec<Resource>> {
        self.enter("list", kind.as_str())?;
        Ok(self.list_kind(kind))
    }
}

impl FleetOperations for FakeFleet {
    async fn lookup_reference(&self, kind: ResourceKind, name: &str) -> AwsResult<String> {
        self.enter("lookup_reference", name)?;
        if self.exists(kind, name) {
            Ok(fake_arn(kind, name))
        } else {
            Err(not_found(name))
        }
    }

    async fn resource_tags(
        &self,
        kind: ResourceKind,
        reference: &str,
    ) -> AwsResult<HashMap<String, String>> {
        let name = reference.rsplit('/').next().unwrap_or(reference);
        self.enter("resource_tags", name)?;
        if !self.exists(kind, name) {
            return Err(not_found(name));
        }
        Ok(lock(&self.state)
            .tags
            .get(&(kind, name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn certificate_devices(&self, certificate_arn: &str) -> AwsResult<Vec<String>> {
        self.enter("certificate_devices", certificate_arn)?;
        Ok(lock(&self.state).attached_devices(certificate_arn))
    }

    async fn list_named_shadows(&self, device: &str) -> AwsResult<Vec<String>> {
        self.enter("list_named_shadows", device)?;
        let state = lock(&self.state);
        let entry = state.devices.get(device).ok_or_else(|| not_found(device))?;
        Ok(entry.named_shadows.iter().cloned().collect())
    }

    async fn delete_shadow(&self, device: &str, shadow: Option<String>) -> AwsResult<()> {
        let label = shadow.as_deref().unwrap_or("classic");
        self.enter("delete_shadow", &format!("{device}/{label}"))?;
        let mut state = lock(&self.state);
        let entry = state.devices.get_mut(device).ok_or_else(|| not_found(device))?;
        let removed = match &shadow {
            Some(name) => entry.named_shadows.remove(name),
            None => std::mem::take(&mut entry.classic_shadow),
        };
        if removed {
            Ok(())
        } else {
            Err(not_found(format!("{device}/{label}")))
        }
    }

    async fn list_device_certificates(&self, device: &str) -> AwsResult<Vec<String>> {
        self.enter("list_device_certificates", device)?;
        let state = lock(&self.state);
        let entry = state.devices.get(device).ok_or_else(|| not_found(device))?;
        Ok(entry.certificates.iter().cloned().collect())
    }

    async fn detach_certificate(&self, device: &str, certificate_arn: &str) -> AwsResult<()> {
        self.enter("detach_certificate", device)?;
        let mut state = lock(&self.state);
        let entry = state.devices.get_mut(device).ok_or_else(|| not_found(device))?;
        if entry.certificates.remove(certificate_arn) {
            Ok(())
        } else {
            Err(not_found(certificate_arn))
        }
    }

    async fn deactivate_certificate(&self, certificate_id: &str) -> AwsResult<()> {
        self.enter("deactivate_certificate", certificate_id)?;
        let mut state = lock(&self.state);
        let cert = state
            .certificates
            .get_mut(certificate_id)
            .ok_or_else(|| not_found(certificate_id))?;
        cert.active = false;
        Ok(())
    }

    async fn delete_certificate(&self, certificate_id: &str) -> AwsResult<()> {
        self.enter("delete_certificate", certificate_id)?;
        let mut state = lock(&self.state);
        let cert = state
            .certificates
            .get(certificate_id)
            .ok_or_else(|| not_found(certificate_id))?;
        if cert.active {
            return Err(AwsError::Conflict(format!("{certificate_id} is active")));
        }
        if !state.attached_devices(&certificate_arn(certificate_id)).is_empty() {
            return Err(AwsError::Conflict(format!("{certificate_id} is attached")));
        }
        state.certificates.remove(certificate_id);
        Ok(())
    }

    async fn delete_device(&self, device: &str) -> AwsResult<()> {
        self.enter("delete_device", device)?;
        let mut state = lock(&self.state);
        let entry = state.devices.get(device).ok_or_else(|| not_found(device))?;
        if !entry.certificates.is_empty() {
            return Err(AwsError::Conflict(format!("{device} has attached principals")));
        }
        state.devices.remove(device);
        for group in state.groups.values_mut() {
            group.members.remove(device);
        }
        state.tags.remove(&(ResourceKind::Device, device.to_string()));
        Ok(())
    }

    async fn is_dynamic_group(&self, group: &str) -> AwsResult<bool> {
        self.enter("is_dynamic_group", group)?;
        let state = lock(&self.state);
        Ok(state.groups.get(group).ok_or_else(|| not_found(group))?.dynamic)
    }

    async fn list_group_members(&self, group: &str) -> AwsResult<Vec<String>> {
        self.enter("list_group_members", group)?;
        let state = lock(&self.state);
        let entry = state.groups.get(group).ok_or_else(|| not_found(group))?;
        Ok(entry.members.iter().cloned().collect())
    }

    async fn remove_group_member(&self, group: &str, device: &str) -> AwsResult<()> {
        self.enter("remove_group_member", &format!("{group}/{device}"))?;
        let mut state = lock(&self.state);
        let entry = state.groups.get_mut(group).ok_or_else(|| not_found(group))?;
        if entry.members.remove(device) {
            Ok(())
        } else {
            Err(not_found(device))
        }
    }

    async fn delete_static_group(&self, group: &str) -> AwsResult<()> {
        self.enter("delete_static_group", group)?;
        let mut state = lock(&self.state);
        let entry = state.groups.get(group).ok_or_else(|| not_found(group))?;
        if entry.dynamic {
            return Err(AwsError::other(format!("{group} is a dynamic group")));
        }
        state.groups.remove(group);
        Ok(())
    }

    async fn delete_dynamic_group(&self, group: &str) -> AwsResult<()> {
        self.enter("delete_dynamic_group", group)?;
        let mut state = lock(&self.state);
        let entry = state.groups.get(group).ok_or_else(|| not_found(group))?;
        if !entry.dynamic {
            return Err(AwsError::other(format!("{group} is a static group")));
        }
        state.groups.remove(group);
        Ok(())
    }

    async fn list_package_versions(&self, package: &str) -> AwsResult<Vec<String>> {
        self.enter("list_package_versions", package)?;
        let state = lock(&self.state);
        let versions = state.packages.get(package).ok_or_else(|| not_found(package))?;
        Ok(versions.iter().cloned().collect())
    }

    async fn delete_package_version(&self, package: &str, version: &str) -> AwsResult<()> {
        self.enter("delete_package_version", &format!("{package}/{version}"))?;
        let mut state = lock(&self.state);
        let versions = state
            .packages
            .get_mut(package)
            .ok_or_else(|| not_found(package))?;
        if versions.remove(version) {
            Ok(())
        } else {
            Err(not_found(version))
        }
    }

    async fn delete_package(&self, package: &str) -> AwsResult<()> {
        self.enter("delete_package", package)?;
        let mut state = lock(&self.state);
        let versions = state.packages.get(package).ok_or_else(|| not_found(package))?;
        if !versions.is_empty() {
            return Err(AwsError::Conflict(format!("{package} still has versions")));
        }
        state.packages.remove(package);
        Ok(())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        from: Option<VersionMarker>,
    ) -> AwsResult<ObjectVersionPage> {
        self.enter("list_object_versions", bucket)?;
        let state = lock(&self.state);
        let objects = state.buckets.get(bucket).ok_or_else(|| not_found(bucket))?;
        let start = from
            .and_then(|m| m.key_marker.parse::<usize>().ok())
            .unwrap_or(0)
            .min(objects.len());
        let end = (start + FAKE_PAGE_SIZE).min(objects.len());
        let next = (end < objects.len()).then(|| VersionMarker {
            key_marker: end.to_string(),
            version_id_marker: None,
        });
        Ok(ObjectVersionPage {
            objects: objects[start..end].to_vec(),
            next,
        })
    }

    async fn delete_objects(&self, bucket: &str, objects: Vec<ObjectRef>) -> AwsResult<usize> {
        self.enter("delete_objects", bucket)?;
        if objects.len() > fleet_teardown_common::defaults::MAX_DELETE_BATCH {
            return Err(AwsError::other("too many keys in one batch"));
        }
        let mut state = lock(&self.state);
        let stored = state.buckets.get_mut(bucket).ok_or_else(|| not_found(bucket))?;
        let before = stored.len();
        stored.retain(|o| !objects.contains(o));
        Ok(before - stored.len())
    }

    async fn delete_bucket(&self, bucket: &str) -> AwsResult<()> {
        self.enter("delete_bucket", bucket)?;
        let mut state = lock(&self.state);
        let objects = state.buckets.get(bucket).ok_or_else(|| not_found(bucket))?;
        if !objects.is_empty() {
            return Err(AwsError::DependencyViolation);
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn list_inline_policies(&self, role: &str) -> AwsResult<Vec<String>> {
        self.enter("list_inline_policies", role)?;
        let state = lock(&self.state);
        let entry = state.roles.get(role).ok_or_else(|| not_found(role))?;
        Ok(entry.inline.iter().cloned().collect())
    }

    async fn delete_inline_policy(&self, role: &str, policy: &str) -> AwsResult<()> {
        self.enter("delete_inline_policy", &format!("{role}/{policy}"))?;
        let mut state = lock(&self.state);
        let entry = state.roles.get_mut(role).ok_or_else(|| not_found(role))?;
        if entry.inline.remove(policy) {
            Ok(())
        } else {
            Err(not_found(policy))
        }
    }

    async fn list_attached_policies(&self, role: &str) -> AwsResult<Vec<String>> {
        self.enter("list_attached_policies", role)?;
        let state = lock(&self.state);
        let entry = state.roles.get(role).ok_or_else(|| not_found(role))?;
        Ok(entry.attached.iter().cloned().collect())
    }

    async fn detach_policy(&self, role: &str, policy_arn: &str) -> AwsResult<()> {
        self.enter("detach_policy", &format!("{role}/{policy_arn}"))?;
        let mut state = lock(&self.state);
        let entry = state.roles.get_mut(role).ok_or_else(|| not_found(role))?;
        if entry.attached.remove(policy_arn) {
            Ok(())
        } else {
            Err(not_found(policy_arn))
        }
    }

    async fn delete_role(&self, role: &str) -> AwsResult<()> {
        self.enter("delete_role", role)?;
        let mut state = lock(&self.state);
        let entry = state.roles.get(role).ok_or_else(|| not_found(role))?;
        if !entry.inline.is_empty() || !entry.attached.is_empty() {
            return Err(AwsError::Conflict(format!("{role} still has policies")));
        }
        state.roles.remove(role);
        Ok(())
    }

    async fn job_status(&self, job: &str) -> AwsResult<JobStatus> {
        self.enter("job_status", job)?;
        let mut state = lock(&self.state);
        let entry = state.jobs.get_mut(job).ok_or_else(|| not_found(job))?;
        if entry.cancel_requested {
            if entry.cancel_lag > 0 {
                entry.cancel_lag -= 1;
                return Ok(JobStatus::InProgress);
            }
            entry.status = JobStatus::Canceled;
        }
        Ok(entry.status)
    }

    async fn cancel_job(&self, job: &str) -> AwsResult<()> {
        self.enter("cancel_job", job)?;
        let mut state = lock(&self.state);
        let entry = state.jobs.get_mut(job).ok_or_else(|| not_found(job))?;
        entry.cancel_requested = true;
        Ok(())
    }

    async fn delete_job(&self, job: &str) -> AwsResult<()> {
        self.enter("delete_job", job)?;
        lock(&self.state)
            .jobs
            .remove(job)
            .map(|_| ())
            .ok_or_else(|| not_found(job))
    }

    async fn deprecate_template(&self, template: &str) -> AwsResult<()> {
        self.enter("deprecate_template", template)?;
        let mut state = lock(&self.state);
        let entry = state
            .templates
            .get_mut(template)
            .ok_or_else(|| not_found(template))?;
        *entry = Some(chrono::Utc::now().timestamp());
        Ok(())
    }

    async fn delete_template(&self, template: &str) -> AwsResult<()> {
        self.enter("delete_template", template)?;
        let mut state = lock(&self.state);
        let deprecated_at = state
            .templates
            .get(template)
            .ok_or_else(|| not_found(template))?;
        if deprecated_at.is_none() {
            return Err(AwsError::Conflict(format!("{template} is not deprecated")));
        }
        state.templates.remove(template);
        Ok(())
    }

    async fn delete_command(&self, command: &str) -> AwsResult<()> {
        self.enter("delete_command", command)?;
        if lock(&self.state).commands.remove(command) {
            Ok(())
        } else {
            Err(not_found(command))
        }
    }

    async fn disable_package_configuration(&self) -> AwsResult<()> {
        self.enter("disable_package_configuration", "account")?;
        lock(&self.state).package_configuration_enabled = false;
        Ok(())
    }

    async fn disable_fleet_indexing(&self) -> AwsResult<()> {
        self.enter("disable_fleet_indexing", "account")?;
        lock(&self.state).fleet_indexing_enabled = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_with_certificate_cannot_be_deleted() {
        let fleet = FakeFleet::new();
        fleet.add_device("Vehicle-VIN-001", true);
        let arn = fleet.add_certificate("Vehicle-VIN-001", "c1");

        assert!(matches!(
            fleet.delete_device("Vehicle-VIN-001").await,
            Err(AwsError::Conflict(_))
        ));
        fleet.detach_certificate("Vehicle-VIN-001", &arn).await.unwrap();
        fleet.delete_device("Vehicle-VIN-001").await.unwrap();
        assert!(fleet.delete_device("Vehicle-VIN-001").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_shadow_delete_is_once_only() {
        let fleet = FakeFleet::new();
        fleet.add_named_shadow("Vehicle-VIN-001", "telemetry");
        fleet.add_classic_shadow("Vehicle-VIN-001");

        fleet
            .delete_shadow("Vehicle-VIN-001", Some("telemetry".to_string()))
            .await
            .unwrap();
        fleet.delete_shadow("Vehicle-VIN-001", None).await.unwrap();

        let err = fleet
            .delete_shadow("Vehicle-VIN-001", Some("telemetry".to_string()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AwsError::NotFound("Vehicle-VIN-001/telemetry does not exist".to_string())
        );
        assert!(fleet.delete_shadow("Vehicle-VIN-001", None).await.unwrap_err().is_not_found());
        assert_eq!(
            fleet.calls_of("delete_shadow"),
            vec![
                "delete_shadow Vehicle-VIN-001/telemetry",
                "delete_shadow Vehicle-VIN-001/classic",
                "delete_shadow Vehicle-VIN-001/telemetry",
                "delete_shadow Vehicle-VIN-001/classic",
            ]
        );
    }

    #[tokio::test]
    async fn test_version_pages() {
        let fleet = FakeFleet::new();
        fleet.add_bucket("iot-firmware-a", 1500, true);

        let first = fleet.list_object_versions("iot-firmware-a", None).await.unwrap();
        assert_eq!(first.objects.len(), 1000);
        let second = fleet
            .list_object_versions("iot-firmware-a", first.next)
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 500);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let fleet = FakeFleet::new();
        fleet.add_command("fleet-cmd-reboot", false);
        fleet.fail_on("delete_command", "fleet-cmd-reboot");

        assert!(fleet.delete_command("fleet-cmd-reboot").await.is_err());
        assert!(fleet.exists(ResourceKind::Command, "fleet-cmd-reboot"));
        assert_eq!(fleet.mutating_calls(), vec!["delete_command fleet-cmd-reboot"]);
    }

    #[tokio::test]
    async fn test_cancelled_job_lags() {
        let fleet = FakeFleet::new();
        fleet.add_job("ota-1", JobStatus::InProgress, 2, true);
        fleet.cancel_job("ota-1").await.unwrap();

        assert_eq!(fleet.job_status("ota-1").await.unwrap(), JobStatus::InProgress);
        assert_eq!(fleet.job_status("ota-1").await.unwrap(), JobStatus::InProgress);
        assert_eq!(fleet.job_status("ota-1").await.unwrap(), JobStatus::Canceled);
    }
}
