use crate::completion::{Completion, Inflight, Outcome, panic_message};
use crate::error::DispatcherError;
use crate::executor::Executor;
use crate::handler::{Callback, Delivery, Handler, HandlerId, Payload, SubscribeOptions};
use crate::subscription::{Registry, Subscription};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::any::type_name;
use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, trace};

const DEFAULT_NAME: &str = "dispatcher";

thread_local! {
    /// Address of the dispatcher whose transactional delivery runs on this thread.
    static TRANSACTIONAL_OWNER: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as running a transactional delivery for one dispatcher.
struct TransactionalScope {
    previous: usize,
}

impl TransactionalScope {
    fn enter(owner: usize) -> Self {
        Self { previous: TRANSACTIONAL_OWNER.replace(owner) }
    }
}

impl Drop for TransactionalScope {
    fn drop(&mut self) {
        TRANSACTIONAL_OWNER.set(self.previous);
    }
}

struct Shared<T> {
    name: Cow<'static, str>,
    thread_name: String,
    executor: Executor,
    /// Serializes dispatches against each other and against registry changes.
    serial: ReentrantMutex<()>,
    handlers: Mutex<Vec<Arc<Handler<T>>>>,
    next_id: AtomicU64,
    inflight: Arc<Inflight>,
}

impl<T> Shared<T> {
    fn address(&self) -> usize {
        std::ptr::from_ref(self).addr()
    }

    /// Takes the serializing lock, unless the current thread is a transactional
    /// delivery of this dispatcher: its dispatch already holds the lock and is
    /// parked until the delivery returns.
    fn serialize(&self) -> Option<ReentrantMutexGuard<'_, ()>> {
        let nested = TRANSACTIONAL_OWNER.with(Cell::get) == self.address();
        (!nested).then(|| self.serial.lock())
    }

    /// Removes a record from the live registry. Callers serialize first.
    fn detach(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        handlers.iter().position(|h| h.id == id).map(|idx| handlers.remove(idx)).is_some()
    }
}

impl<T: Payload> Shared<T> {
    fn insert(&self, options: SubscribeOptions, callback: Callback<T>) -> HandlerId {
        let _serial = self.serialize();
        let id = HandlerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut handlers = self.handlers.lock();
        handlers.push(Arc::new(Handler::new(id, options, callback)));
        trace!(
            dispatcher = %self.name,
            event = type_name::<T>(),
            handler = %id,
            once = options.once,
            delivery = ?options.delivery,
            total = handlers.len(),
            "Handler subscribed"
        );
        id
    }
}

impl<T: Payload> Registry for Shared<T> {
    fn remove(&self, id: HandlerId) -> bool {
        let _serial = self.serialize();
        let removed = self.detach(id);
        if removed {
            trace!(dispatcher = %self.name, event = type_name::<T>(), handler = %id, "Handler unsubscribed");
        }
        removed
    }

    fn contains(&self, id: HandlerId) -> bool {
        self.handlers.lock().iter().any(|h| h.id == id)
    }
}

/// A publish/subscribe dispatcher for one payload type.
///
/// Handlers are delivered in registration order. Inline handlers run on the
/// dispatching thread while the dispatcher's lock is held, so a slow inline
/// handler delays every other dispatch and every subscribe/unsubscribe on this
/// dispatcher. Async handlers run on the configured [`Executor`].
///
/// Cloning is cheap and yields another handle to the same dispatcher.
pub struct Dispatcher<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Payload> Dispatcher<T> {
    /// Creates an empty dispatcher with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use = "The builder must be built to create a dispatcher"]
    pub fn builder() -> DispatcherBuilder<T> {
        DispatcherBuilder::default()
    }

    /// Registers a persistent handler invoked inline on every dispatch.
    ///
    /// # Examples
    /// ```rust
    /// use herald_dispatcher::Dispatcher;
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// # fn main() -> Result<(), herald_dispatcher::DispatcherError> {
    /// let dispatcher = Dispatcher::<usize>::new();
    /// let total = Arc::new(AtomicUsize::new(0));
    /// let sink = Arc::clone(&total);
    /// dispatcher.subscribe(move |n| {
    ///     sink.fetch_add(n, Ordering::SeqCst);
    /// });
    ///
    /// dispatcher.dispatch(2)?;
    /// dispatcher.dispatch(3)?;
    /// assert_eq!(total.load(Ordering::SeqCst), 5);
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_with(SubscribeOptions::new(), callback)
    }

    /// Registers an inline handler that receives at most one payload.
    pub fn subscribe_once<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_with(SubscribeOptions::new().once(), callback)
    }

    /// Registers a persistent handler that runs on its own task per dispatch.
    ///
    /// With `transactional` set, `dispatch` waits for the handler to finish
    /// before delivering to the next one, so it keeps its place in the
    /// registration order while running off the dispatching thread.
    pub fn subscribe_async<F>(&self, callback: F, transactional: bool) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_with(
            SubscribeOptions::new().delivery(Delivery::spawned(transactional)),
            callback,
        )
    }

    /// Registers an async handler that receives at most one payload.
    pub fn subscribe_once_async<F>(&self, callback: F, transactional: bool) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_with(
            SubscribeOptions::new().once().delivery(Delivery::spawned(transactional)),
            callback,
        )
    }

    /// Registers a handler with explicit options. No dispatch is triggered.
    pub fn subscribe_with<F>(&self, options: SubscribeOptions, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = self.shared.insert(options, Arc::new(callback));
        let shared: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        let registry: Weak<dyn Registry> = shared;
        Subscription::new(id, registry)
    }

    /// Delivers `payload` to every handler registered when the call starts.
    ///
    /// Handlers subscribed or unsubscribed while the dispatch runs only affect later
    /// dispatches. Once handlers are removed right before they are invoked; one that
    /// a nested dispatch already fired is skipped.
    ///
    /// Returns the number of handlers the payload was delivered or handed to.
    ///
    /// # Errors
    /// Returns [`DispatcherError::Spawn`] if an async delivery cannot be scheduled,
    /// [`DispatcherError::HandlerPanicked`] if a transactional handler panics, or
    /// [`DispatcherError::Abandoned`] if the executor drops a transactional delivery
    /// before running it. Handlers after the failing one are not delivered.
    ///
    /// # Panics
    /// A panic in an inline handler propagates to the caller; the remaining
    /// handlers are not delivered and the dispatcher stays usable.
    pub fn dispatch(&self, payload: T) -> Result<usize, DispatcherError> {
        let shared = &*self.shared;
        let _serial = shared.serialize();
        let snapshot = shared.handlers.lock().clone();

        if snapshot.is_empty() {
            trace!(dispatcher = %shared.name, event = type_name::<T>(), "Event dropped: no subscribers");
            return Ok(0);
        }

        let mut delivered = 0;
        for handler in &snapshot {
            if handler.options.once {
                if !handler.claim() {
                    debug!(
                        dispatcher = %shared.name,
                        event = type_name::<T>(),
                        handler = %handler.id,
                        "Once handler already fired; skipping"
                    );
                    continue;
                }
                shared.detach(handler.id);
            }

            match handler.options.delivery {
                Delivery::Inline => handler.invoke(payload.clone()),
                Delivery::Detached => self.spawn(handler, payload.clone(), None)?,
                Delivery::Transactional => {
                    let completion = Arc::new(Completion::default());
                    self.spawn(handler, payload.clone(), Some(Arc::clone(&completion)))?;
                    self.settle(handler.id, completion.wait())?;
                },
            }
            delivered += 1;
        }

        trace!(dispatcher = %shared.name, event = type_name::<T>(), delivered, "Event dispatched");
        Ok(delivered)
    }

    /// Blocks until every async delivery issued so far has finished.
    ///
    /// This is a point-in-time drain: dispatches started meanwhile are waited for as
    /// well, but nothing stops new ones. Calling it from inside an async handler of
    /// the same dispatcher never returns.
    pub fn wait(&self) {
        debug!(dispatcher = %self.shared.name, pending = self.pending(), "Waiting for async deliveries");
        self.shared.inflight.wait();
    }

    /// Like [`Dispatcher::wait`], giving up after `timeout`.
    ///
    /// Returns `true` if no async delivery was outstanding when it returned.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.shared.inflight.wait_for(timeout)
    }

    /// Async counterpart of [`Dispatcher::wait`] that does not block a runtime worker.
    pub async fn drained(&self) {
        self.shared.inflight.drained().await;
    }

    /// Number of async deliveries currently in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.inflight.pending()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.handlers.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every handler, returning how many were registered.
    ///
    /// Outstanding [`Subscription`]s become no-ops.
    pub fn clear(&self) -> usize {
        let _serial = self.shared.serialize();
        let removed = std::mem::take(&mut *self.shared.handlers.lock()).len();
        debug!(dispatcher = %self.shared.name, removed, "Dispatcher cleared");
        removed
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.shared.executor
    }

    fn spawn(
        &self,
        handler: &Handler<T>,
        payload: T,
        completion: Option<Arc<Completion>>,
    ) -> Result<(), DispatcherError> {
        let shared = &*self.shared;
        let guard = shared.inflight.begin(completion);
        let callback = handler.callback();
        let id = handler.id;
        let name = shared.name.clone();
        let owner =
            (handler.options.delivery == Delivery::Transactional).then(|| shared.address());

        shared.executor.spawn(&shared.thread_name, move || {
            let _scope = owner.map(TransactionalScope::enter);
            let outcome = match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(()) => Outcome::Finished,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        dispatcher = %name,
                        event = type_name::<T>(),
                        handler = %id,
                        %message,
                        "Async handler panicked"
                    );
                    Outcome::Panicked(message)
                },
            };
            guard.settle(outcome);
        })
    }

    fn settle(&self, id: HandlerId, outcome: Outcome) -> Result<(), DispatcherError> {
        let context = || -> Option<Cow<'static, str>> {
            Some(format!("handler {id} on '{}'", self.shared.name).into())
        };
        match outcome {
            Outcome::Finished => Ok(()),
            Outcome::Panicked(message) => {
                Err(DispatcherError::HandlerPanicked { message: message.into(), context: context() })
            },
            Outcome::Abandoned => Err(DispatcherError::Abandoned {
                message: "executor dropped the delivery".into(),
                context: context(),
            }),
        }
    }
}

impl<T: Payload> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.shared.name)
            .field("event", &type_name::<T>())
            .field("executor", &self.shared.executor.kind())
            .field("handlers", &self.shared.handlers.lock().len())
            .field("pending", &self.shared.inflight.pending())
            .finish()
    }
}

/// Configures a [`Dispatcher`].
pub struct DispatcherBuilder<T> {
    name: Cow<'static, str>,
    thread_name: Option<String>,
    executor: Option<Executor>,
    payload: PhantomData<fn() -> T>,
}

impl<T> Default for DispatcherBuilder<T> {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed(DEFAULT_NAME),
            thread_name: None,
            executor: None,
            payload: PhantomData,
        }
    }
}

impl<T: Payload> DispatcherBuilder<T> {
    /// Name used in log fields and, by default, in async thread names.
    ///
    /// Blank names fall back to `"dispatcher"`.
    #[must_use = "The builder must be built to create a dispatcher"]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides where async deliveries run. Defaults to [`Executor::detect`] at build time.
    #[must_use = "The builder must be built to create a dispatcher"]
    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Thread name for [`Executor::Threads`]. Defaults to `"<name>-async"`.
    #[must_use = "The builder must be built to create a dispatcher"]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Dispatcher<T> {
        let name = if self.name.trim().is_empty() { Cow::Borrowed(DEFAULT_NAME) } else { self.name };
        let thread_name = self
            .thread_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{name}-async"));
        let executor = self.executor.unwrap_or_else(Executor::detect);

        debug!(dispatcher = %name, event = type_name::<T>(), executor = executor.kind(), "Dispatcher created");

        Dispatcher {
            shared: Arc::new(Shared {
                name,
                thread_name,
                executor,
                serial: ReentrantMutex::new(()),
                handlers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                inflight: Arc::new(Inflight::default()),
            }),
        }
    }
}

impl<T> fmt::Debug for DispatcherBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("name", &self.name)
            .field("thread_name", &self.thread_name)
            .field("executor", &self.executor.as_ref().map(Executor::kind))
            .finish()
    }
}
