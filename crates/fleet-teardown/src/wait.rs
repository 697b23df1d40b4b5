//! Bounded polling with exponential backoff and cancellation support.
//!
//! Used wherever teardown has to wait for the provider to settle, such as a
//! cancelled deployment job leaving its active state. Time is read from
//! `tokio::time` so waits run instantly on a paused test clock.

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use fleet_teardown_common::defaults::{JOB_CANCEL_MAX_WAIT, JOB_CANCEL_POLL_INTERVAL};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for a bounded poll
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between checks
    pub initial_delay: Duration,
    /// Cap for exponential growth
    pub max_delay: Duration,
    /// Maximum total time to wait before giving up
    pub timeout: Duration,
}

impl WaitConfig {
    /// Poll settings for a cancelled job leaving its active state
    pub fn job_cancel() -> Self {
        Self {
            initial_delay: JOB_CANCEL_POLL_INTERVAL,
            max_delay: Duration::from_secs(4),
            timeout: JOB_CANCEL_MAX_WAIT,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Poll `check` until it reports ready, the timeout passes, or `cancel` fires.
///
/// # Returns
/// * `Ok(())` - `check` returned `Ok(true)`
/// * `Err` - timeout, cancellation, or the check itself failed
pub async fn wait_for<F, Fut>(
    config: WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    what: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .without_max_times()
        .build();

    loop {
        attempts += 1;

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            anyhow::bail!("Wait for {what} cancelled");
        }

        match check().await {
            Ok(true) => {
                debug!(target_name = %what, attempts, "Condition reached");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(target_name = %what, error = ?e, "Check failed");
                return Err(e);
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            anyhow::bail!(
                "Timeout waiting for {what} after {:?} ({attempts} attempts)",
                config.timeout
            );
        }

        // Never sleep past the deadline
        let delay = delays
            .next()
            .unwrap_or(config.max_delay)
            .min(config.timeout - elapsed);
        debug!(
            target_name = %what,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Not ready, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                anyhow::bail!("Wait for {what} cancelled");
            }
        }
    }
}
