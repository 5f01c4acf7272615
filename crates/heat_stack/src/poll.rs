//! Deadline-bounded, cancellable waiting between status polls.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{StackError, StackResult};

/// Stand-in deadline for timeouts too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Paces status polls for one lifecycle transition.
///
/// Each [`Poller::wait`] sleeps for the poll interval, or whatever is left
/// before the deadline if that is shorter. Once the deadline has passed the
/// next wait fails with [`StackError::Timeout`]; cancelling the token fails
/// it with [`StackError::Cancelled`] without waiting out the sleep.
/// [`Poller::bounded`] holds the status fetch itself to the same deadline.
#[derive(Debug)]
pub struct Poller {
    stack: String,
    interval: Duration,
    timeout: Duration,
    deadline: Instant,
    polls: u32,
}

impl Poller {
    /// Start the clock for `stack`.
    pub fn start(stack: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            stack: stack.into(),
            interval,
            timeout,
            deadline: now.checked_add(timeout).unwrap_or(now + FAR_FUTURE),
            polls: 0,
        }
    }

    /// Number of completed waits.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Sleep until the next poll is due.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> StackResult<()> {
        if cancel.is_cancelled() {
            return Err(StackError::Cancelled(self.stack.clone()));
        }

        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(self.timed_out());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StackError::Cancelled(self.stack.clone())),
            _ = sleep(self.interval.min(remaining)) => {
                self.polls += 1;
                Ok(())
            }
        }
    }

    /// Run `fut` unless the token fires or the deadline passes first, in
    /// which case `fut` is dropped mid-flight. A `fut` that is already
    /// ready at the deadline still wins.
    pub async fn bounded<F: Future>(
        &self,
        fut: F,
        cancel: &CancellationToken,
    ) -> StackResult<F::Output> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StackError::Cancelled(self.stack.clone())),
            output = fut => Ok(output),
            _ = sleep_until(self.deadline) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> StackError {
        StackError::Timeout {
            stack: self.stack.clone(),
            seconds: self.timeout.as_secs(),
        }
    }
}
