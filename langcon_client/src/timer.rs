use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One-shot delayed action. Cancelling or dropping before the delay elapses
/// discards it; once started it runs to completion.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(delay: Duration, scope: &CancellationToken, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = scope.child_token();
        let guard = token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = guard.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            action.await;
        });
        Self { token, task }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
