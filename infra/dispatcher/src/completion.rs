use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::warn;

/// How an async delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Finished,
    Panicked(String),
    /// The task was dropped without running the callback.
    Abandoned,
}

/// Dispatcher-scoped count of in-flight async deliveries.
#[derive(Debug, Default)]
pub(crate) struct Inflight {
    pending: Mutex<usize>,
    drained: Condvar,
    notify: Notify,
}

impl Inflight {
    /// Registers a delivery. The returned guard releases it on every exit path.
    pub(crate) fn begin(self: &Arc<Self>, completion: Option<Arc<Completion>>) -> DeliveryGuard {
        *self.pending.lock() += 1;
        DeliveryGuard { inflight: Arc::clone(self), completion, outcome: Outcome::Abandoned }
    }

    fn finish(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
            self.notify.notify_waiters();
        }
    }

    pub(crate) fn pending(&self) -> usize {
        *self.pending.lock()
    }

    pub(crate) fn wait(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.drained.wait(&mut pending);
        }
    }

    pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        let _ = self.drained.wait_while_for(&mut pending, |pending| *pending > 0, timeout);
        *pending == 0
    }

    pub(crate) async fn drained(&self) {
        loop {
            let mut notified = std::pin::pin!(self.notify.notified());
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One-shot completion signal for a transactional delivery.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    outcome: Mutex<Option<Outcome>>,
    done: Condvar,
}

impl Completion {
    fn complete(&self, outcome: Outcome) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
            self.done.notify_all();
        }
    }

    /// Blocks until the delivery settles.
    pub(crate) fn wait(&self) -> Outcome {
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            self.done.wait(&mut slot);
        }
    }
}

/// Moves with an async delivery into its task.
///
/// Dropping it decrements the in-flight count and settles the transactional
/// completion, if any. A guard dropped without [`DeliveryGuard::settle`] reports
/// [`Outcome::Abandoned`].
#[derive(Debug)]
pub(crate) struct DeliveryGuard {
    inflight: Arc<Inflight>,
    completion: Option<Arc<Completion>>,
    outcome: Outcome,
}

impl DeliveryGuard {
    pub(crate) fn settle(mut self, outcome: Outcome) {
        self.outcome = outcome;
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        let outcome = std::mem::replace(&mut self.outcome, Outcome::Abandoned);
        if outcome == Outcome::Abandoned {
            warn!("Async delivery dropped before its handler ran");
        }
        if let Some(completion) = self.completion.take() {
            completion.complete(outcome);
        }
        self.inflight.finish();
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
