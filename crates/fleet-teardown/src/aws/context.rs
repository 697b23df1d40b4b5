//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once and
//! creating every service client the teardown needs from the same config.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;
use tracing::debug;

/// Endpoint type of the device data plane (shadows)
const DATA_ENDPOINT_TYPE: &str = "iot:Data-ATS";

/// Shared AWS configuration context for creating service clients.
///
/// # Example
/// ```ignore
/// let aws = AwsContext::with_profile("us-east-1", Some("training")).await;
/// let iot = aws.iot_client();
/// let shadows = aws.iot_data_client().await?;
/// ```
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load AWS configuration for the specified region.
    pub async fn new(region: &str) -> Self {
        Self::with_profile(region, None).await
    }

    /// Load AWS configuration, optionally from a named profile.
    ///
    /// Credentials, region configuration and other SDK settings come from
    /// the environment, config files, and IAM roles.
    pub async fn with_profile(region: &str, profile: Option<&str>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Device registry, groups, jobs, packages, templates, commands
    pub fn iot_client(&self) -> aws_sdk_iot::Client {
        aws_sdk_iot::Client::new(self.sdk_config())
    }

    pub fn iam_client(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(self.sdk_config())
    }

    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(self.sdk_config())
    }

    pub fn sts_client(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(self.sdk_config())
    }

    /// Create a data-plane (shadow) client.
    ///
    /// The data plane has an account-specific endpoint which is discovered
    /// through the control plane first.
    pub async fn iot_data_client(&self) -> Result<aws_sdk_iotdataplane::Client> {
        let endpoint = self
            .iot_client()
            .describe_endpoint()
            .endpoint_type(DATA_ENDPOINT_TYPE)
            .send()
            .await
            .context("Failed to discover the IoT data endpoint")?;
        let address = endpoint
            .endpoint_address()
            .context("No address returned for the IoT data endpoint")?;
        debug!(endpoint = %address, "Discovered IoT data endpoint");

        let config = aws_sdk_iotdataplane::config::Builder::from(self.sdk_config())
            .endpoint_url(format!("https://{address}"))
            .build();
        Ok(aws_sdk_iotdataplane::Client::from_conf(config))
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
