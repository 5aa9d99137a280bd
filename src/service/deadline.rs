//! Deadline enforcement for blocking work (database reads, artifact loads).

use crate::error::ServiceError;
use std::time::Duration;

/// Run `work` on a blocking thread and give up after `limit`.
/// A zero `limit` disables the deadline.
///
/// On expiry the worker thread is detached rather than joined, so the caller returns
/// promptly even if the underlying call never does.
pub fn run_with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    if limit.is_zero() {
        return work();
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| ServiceError::Aborted {
            operation,
            reason: e.to_string(),
        })?;
    let outcome =
        runtime.block_on(async { tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await });
    runtime.shutdown_background();

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(ServiceError::Aborted {
            operation,
            reason: join.to_string(),
        }),
        Err(_) => {
            tracing::warn!(operation, ?limit, "deadline exceeded");
            Err(ServiceError::Timeout { operation, limit })
        }
    }
}
