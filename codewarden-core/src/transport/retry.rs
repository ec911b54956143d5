//! Exponential backoff around a single [`EventSink`] delivery.

use log::warn;
use std::time::Duration;

use crate::transport::envelope::WireBody;
use crate::transport::sink::{DeliveryError, EventSink};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_retries.max(1),
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Final result of delivering one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    /// A non-retryable error; the batch was attempted once.
    Rejected { attempts: u32, error: DeliveryError },
    /// Every attempt failed transiently.
    Exhausted { attempts: u32, error: DeliveryError },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts }
            | DeliveryOutcome::Rejected { attempts, .. }
            | DeliveryOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Delivers `body`, sleeping between transient failures.
pub async fn deliver_with_retry(sink: &dyn EventSink, body: &WireBody, policy: &RetryPolicy) -> DeliveryOutcome {
    let mut attempt = 0u32;
    loop {
        let result = sink.deliver(body).await;
        attempt += 1;

        let error = match result {
            Ok(()) => return DeliveryOutcome::Delivered { attempts: attempt },
            Err(e) if !e.is_retryable() => {
                return DeliveryOutcome::Rejected { attempts: attempt, error: e };
            }
            Err(e) => e,
        };

        if attempt >= policy.max_attempts {
            return DeliveryOutcome::Exhausted { attempts: attempt, error };
        }

        let delay = policy.delay_for(attempt - 1);
        warn!(
            "Delivery via {} failed (attempt {}/{}): {}. Retrying in {:?}.",
            sink.name(),
            attempt,
            policy.max_attempts,
            error,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
