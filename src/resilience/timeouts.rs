//! Deadline enforcement for outbound calls.
//!
//! # Responsibilities
//! - Race an outbound call against a fixed deadline
//! - Report which side of the race finished first
//!
//! # Concurrency Contract
//! [`race_deadline`] spawns the call onto the Tokio runtime and waits on its
//! join handle under a timer. When the timer wins, the handle is dropped.
//! Dropping a `JoinHandle` detaches the task: the call is abandoned, NOT
//! cancelled. It keeps running to completion and its output is discarded.
//! Callers must not rely on side effects of the call being suppressed.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The call did not produce a value before the deadline.
#[derive(Debug, Error)]
pub enum DeadlineError {
    /// The timer fired first; the call was left running.
    #[error("deadline of {0:?} elapsed")]
    Elapsed(Duration),

    /// The spawned call panicked or the runtime shut it down.
    #[error("call aborted: {0}")]
    Aborted(String),
}

/// Wait for whichever finishes first: `call` or a timer of length `deadline`.
///
/// See the module documentation for the non-cancellation semantics.
pub async fn race_deadline<F>(call: F, deadline: Duration) -> Result<F::Output, DeadlineError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(call);

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(join_error)) => Err(DeadlineError::Aborted(join_error.to_string())),
        Err(_) => Err(DeadlineError::Elapsed(deadline)),
    }
}
