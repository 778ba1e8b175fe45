//! Deadline enforcement for store calls

use query_core::{QueryError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `thunk` and wait for it at most `timeout`
///
/// The call and the deadline race; when the deadline wins, the call's
/// future is dropped, which cancels it at its next suspension point.
pub async fn run_with_timeout<F, Fut>(thunk: F, timeout: Duration) -> Result<Fut::Output>
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    match tokio::time::timeout(timeout, thunk()).await {
        Ok(output) => Ok(output),
        Err(_) => {
            warn!("Query timed out after {:?}", timeout);
            Err(QueryError::Timeout(timeout.as_millis() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline() {
        let result = run_with_timeout(
            || async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                42
            },
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(result, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins() {
        let result = run_with_timeout(
            || tokio::time::sleep(Duration::from_millis(50)),
            Duration::from_millis(10),
        )
        .await;

        assert_eq!(result, Err(QueryError::Timeout(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_losing_call_is_cancelled() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let result = run_with_timeout(
            move || async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
