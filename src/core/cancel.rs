//! Cooperative cancellation helpers built on [`CancellationToken`].
//!
//! Long-running engine steps check the caller's token between units of work with
//! [`checkpoint`], and race in-flight I/O against it with [`OrCancel::or_cancel`].

use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::error::ProjiError;

/// Fail with [`ProjiError::Cancelled`] if the token has fired.
pub fn checkpoint(token: &CancellationToken, operation: &str) -> Result<(), ProjiError> {
    if token.is_cancelled() {
        tracing::debug!("cancellation observed before {operation}");
        return Err(ProjiError::cancelled(operation));
    }
    Ok(())
}

/// Extension trait racing a future against a cancellation token.
pub trait OrCancel: Future + Sized {
    /// Resolve to the future's output, or to [`ProjiError::Cancelled`] naming
    /// `operation` if the token fires first. The losing future is dropped.
    fn or_cancel(
        self,
        token: &CancellationToken,
        operation: &str,
    ) -> impl Future<Output = anyhow::Result<Self::Output>> + Send
    where
        Self: Send,
        Self::Output: Send;
}

impl<F: Future> OrCancel for F {
    fn or_cancel(
        self,
        token: &CancellationToken,
        operation: &str,
    ) -> impl Future<Output = anyhow::Result<Self::Output>> + Send
    where
        Self: Send,
        Self::Output: Send,
    {
        let token = token.clone();
        let operation = operation.to_string();
        async move {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(ProjiError::cancelled(operation).into()),
                output = self => Ok(output),
            }
        }
    }
}
