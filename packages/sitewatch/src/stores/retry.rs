//! Bounded retry with exponential backoff for store operations.

use std::future::Future;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::types::config::RetryPolicy;

/// Run `f` until it succeeds, fails with a non-transient error, or the
/// policy's attempts run out.
///
/// Each attempt must leave the store unchanged when it fails (a rolled
/// back transaction), so repeating it is safe. Exhaustion surfaces
/// `StoreError::RetriesExhausted` wrapping the last error.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut f: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                return Err(StoreError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient store error, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
