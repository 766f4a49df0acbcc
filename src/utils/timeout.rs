//! Deadline helpers
//!
//! Wraps an engine call in a real timer so a deadline is reported as its own
//! variant instead of being inferred from whatever the transport raises.

use std::time::Duration;

/// Run `future` against a wall-clock budget.
///
/// Returns `Err(TimeoutError::Timeout)` once the budget elapses. The inner
/// future is dropped at that point, which cancels the pending request.
pub async fn with_timeout<T, E>(
    budget: Duration,
    future: impl std::future::Future<Output = Result<T, E>>,
) -> Result<T, TimeoutError<E>> {
    match tokio::time::timeout(budget, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TimeoutError::Inner(err)),
        Err(_) => Err(TimeoutError::Timeout(budget)),
    }
}

/// Error type for deadline-bounded operations
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Inner(E),
}

impl<E> TimeoutError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeoutError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result: Result<i64, TimeoutError<String>> =
            with_timeout(Duration::from_secs(1), async { Ok::<_, String>(0) }).await;

        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_with_timeout_inner_error() {
        let result: Result<i64, TimeoutError<String>> = with_timeout(
            Duration::from_secs(1),
            async { Err::<i64, _>("engine fault".to_string()) },
        )
        .await;

        match result {
            Err(TimeoutError::Inner(msg)) => assert_eq!(msg, "engine fault"),
            other => panic!("expected inner error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_elapsed() {
        let result: Result<i64, TimeoutError<String>> = with_timeout(
            Duration::from_millis(10),
            std::future::pending::<Result<i64, String>>(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
    }
}
