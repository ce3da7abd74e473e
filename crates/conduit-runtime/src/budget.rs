//! Per-request wall-clock deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why an awaited operation was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The request deadline passed.
    Timeout,
    /// The caller cancelled the request.
    Cancelled,
}

/// Deadline and cancellation token shared by every suspension point of one
/// request.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestBudget {
    /// Start a budget now. `None` means no deadline.
    #[must_use]
    pub fn new(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        Self {
            timeout,
            deadline,
            cancel,
        }
    }

    /// No deadline and a token nobody else holds.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(None, CancellationToken::new())
    }

    /// The configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the caller has cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it finishes, the deadline passes or the token is
    /// cancelled. Cancellation wins over the deadline when both are ready.
    ///
    /// # Errors
    ///
    /// Returns the [`Interrupt`] that stopped `fut`; `fut` is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            () = deadline => Err(Interrupt::Timeout),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_budget() {
        let budget = RequestBudget::new(Some(Duration::from_secs(5)), CancellationToken::new());
        assert_eq!(budget.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_slow_future() {
        let budget = RequestBudget::new(Some(Duration::from_millis(50)), CancellationToken::new());
        let result = budget
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(result, Err(Interrupt::Timeout));
    }

    #[tokio::test]
    async fn test_cancellation_is_distinct_from_timeout() {
        let token = CancellationToken::new();
        let budget = RequestBudget::new(Some(Duration::from_secs(60)), token.clone());
        token.cancel();
        let result = budget.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(Interrupt::Cancelled));
        assert!(budget.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_waits() {
        let budget = RequestBudget::unbounded();
        let result = budget
            .run(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                "late"
            })
            .await;
        assert_eq!(result, Ok("late"));
        assert_eq!(budget.timeout(), None);
    }
}
