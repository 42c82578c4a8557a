use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A delayed, cancellable piece of work.
///
/// The timer task only sleeps. When it fires, the work is spawned as a
/// separate task, so cancelling the timer never interrupts work that has
/// already started (the work itself may end up cancelling this timer).
#[derive(Debug)]
pub struct RenewalTask {
    timer: JoinHandle<()>,
    due_at: Instant,
}

impl RenewalTask {
    pub fn schedule<F, Fut>(delay: Duration, work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let due_at = Instant::now() + delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(due_at).await;
            debug!("Renewal timer fired");
            tokio::spawn(work());
        });

        Self { timer, due_at }
    }

    /// When the timer fires
    pub fn due_at(&self) -> Instant {
        self.due_at
    }

    /// True once the timer fired (or was cancelled)
    pub fn is_finished(&self) -> bool {
        self.timer.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for RenewalTask {
    fn drop(&mut self) {
        if !self.timer.is_finished() {
            debug!("Cancelling pending renewal timer");
            self.timer.abort();
        }
    }
}
