//! Bounded retry for idempotent store operations.
//!
//! Only errors classified as transient by [`CortexError::is_transient`] are
//! retried. Once the policy is exhausted the last error is returned to the
//! caller unchanged. LLM calls never go through here.

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{CortexError, CortexResult};

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Initial delay before first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (milliseconds).
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            multiplier: 2.0_f32,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.max_retries as usize)
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_factor(self.multiplier)
    }
}

/// Run `op`, retrying transient failures according to `policy`.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, op: F) -> CortexResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CortexResult<T>>,
{
    op.retry(policy.backoff())
        .when(CortexError::is_transient)
        .notify(|err, dur| {
            tracing::warn!("{} failed, retrying in {:?}: {}", operation, dur, err);
        })
        .await
        .map_err(|err| {
            if err.is_transient() {
                tracing::error!(
                    "{} failed after {} retries: {}",
                    operation,
                    policy.max_retries,
                    err
                );
            }
            err
        })
}
