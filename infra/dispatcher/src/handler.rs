use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Marker trait for payloads that can travel through a [`Dispatcher`](crate::Dispatcher).
///
/// Every handler receives its own clone, so an async delivery never shares the
/// payload with the dispatching thread.
pub trait Payload: Clone + Send + 'static {}
impl<T: Clone + Send + 'static> Payload for T {}

pub(crate) type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Identity of one subscription within its dispatcher.
///
/// Ids are handed out in registration order and never reused by the same dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a handler receives payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Invoked inline on the dispatching thread.
    #[default]
    Inline,
    /// Runs on its own task. `dispatch` does not wait for it; `wait` does.
    Detached,
    /// Runs on its own task, but `dispatch` waits for it to finish before moving
    /// on to the next handler.
    Transactional,
}

impl Delivery {
    /// The async delivery matching the `transactional` flag.
    #[must_use]
    pub const fn spawned(transactional: bool) -> Self {
        if transactional { Self::Transactional } else { Self::Detached }
    }

    #[must_use]
    pub const fn is_async(self) -> bool {
        !matches!(self, Self::Inline)
    }
}

/// Options for [`Dispatcher::subscribe_with`](crate::Dispatcher::subscribe_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    /// Remove the handler right before its first delivery.
    pub once: bool,
    pub delivery: Delivery,
}

impl SubscribeOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self { once: false, delivery: Delivery::Inline }
    }

    #[must_use = "Options are applied only when passed to subscribe_with"]
    pub const fn once(mut self) -> Self {
        self.once = true;
        self
    }

    #[must_use = "Options are applied only when passed to subscribe_with"]
    pub const fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }
}

/// A registered subscription. Only the `fired` flag of once handlers changes after creation.
pub(crate) struct Handler<T> {
    pub(crate) id: HandlerId,
    pub(crate) options: SubscribeOptions,
    callback: Callback<T>,
    fired: AtomicBool,
}

impl<T> Handler<T> {
    pub(crate) fn new(id: HandlerId, options: SubscribeOptions, callback: Callback<T>) -> Self {
        Self { id, options, callback, fired: AtomicBool::new(false) }
    }

    /// Marks the handler as fired. Returns `false` if a previous delivery already did.
    pub(crate) fn claim(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn invoke(&self, payload: T) {
        (self.callback)(payload);
    }

    pub(crate) fn callback(&self) -> Callback<T> {
        Arc::clone(&self.callback)
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("fired", &self.fired.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
