//! Cancellable scheduled tasks
//!
//! Every timer in the agent (the batch flush timeout and the retry loop) is a
//! task scheduled through [`TaskScheduler::schedule`], which returns a
//! [`CancelToken`]. Cancelling the token before the delay elapses drops the
//! task without running it. Delays use tokio's monotonic clock, so tests can
//! drive them with a paused runtime clock.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a scheduled task
#[derive(Debug, Clone, Default)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    /// Prevents the task from running if its delay has not elapsed yet
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Spawns delayed and immediate work onto a captured runtime
///
/// Holding a [`Handle`] rather than relying on an ambient runtime lets the
/// agent be called from threads that are not runtime workers, such as a
/// panic hook.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    handle: Handle,
}

impl TaskScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Captures the runtime of the calling context
    pub fn try_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Runs `task` after `delay` unless the returned token is cancelled first
    pub fn schedule<F, Fut>(&self, delay: Duration, task: F) -> CancelToken
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancelToken::default();
        let cancelled = token.0.clone();
        self.handle.spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => task().await,
            }
        });
        token
    }

    /// Cancels a previously scheduled task
    pub fn cancel(&self, token: &CancelToken) {
        token.cancel();
    }

    /// Runs `future` now, in the background
    pub fn spawn<Fut>(&self, future: Fut) -> JoinHandle<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }
}
