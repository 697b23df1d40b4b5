//! Devices and certificates
//!
//! A device cannot be deleted while certificates are attached to it, and its
//! shadows would otherwise outlive it. Shadows go first (named, then
//! classic), then each attached certificate is detached, deactivated and
//! deleted.

use super::StepLog;
use crate::aws::{AwsResult, FleetOperations};
use crate::resource::{Resource, attr, certificate_id_from_arn};

pub(super) async fn delete_device<F: FleetOperations>(
    ops: &F,
    device: &str,
    log: &mut StepLog<'_>,
) -> AwsResult<()> {
    for shadow in log.listed("list named shadows", ops.list_named_shadows(device).await) {
        let result = ops.delete_shadow(device, Some(shadow.clone())).await;
        log.record(format!("shadow:{shadow}"), result);
    }
    // Classic shadow is optional; absence is reported as not-found
    log.record("shadow:classic".to_string(), ops.delete_shadow(device, None).await);

    let certificates = log.listed(
        "list certificates",
        ops.list_device_certificates(device).await,
    );
    for arn in certificates {
        let id = certificate_id_from_arn(&arn).unwrap_or(&arn).to_string();
        log.attempt("detach certificate", ops.detach_certificate(device, &arn).await);
        log.attempt("deactivate certificate", ops.deactivate_certificate(&id).await);
        let result = ops.delete_certificate(&id).await;
        log.record(format!("certificate:{id}"), result);
    }

    ops.delete_device(device).await
}

/// Certificates found on their own (not through a device): detach from
/// every device, deactivate unless listed as already inactive, then
/// force-delete.
pub(super) async fn delete_certificate<F: FleetOperations>(
    ops: &F,
    certificate: &Resource,
    log: &mut StepLog<'_>,
) -> AwsResult<()> {
    let id = certificate.certificate_id();

    if let Some(arn) = certificate.arn.as_deref() {
        for device in log.listed("list attached devices", ops.certificate_devices(arn).await) {
            let result = ops.detach_certificate(&device, arn).await;
            log.record(format!("attachment:{device}"), result);
        }
    }
    if !matches!(certificate.attr(attr::STATUS), Some("INACTIVE" | "REVOKED")) {
        log.attempt("deactivate certificate", ops.deactivate_certificate(id).await);
    }

    ops.delete_certificate(id).await
}
