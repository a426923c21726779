#![allow(dead_code)]

use herald_dispatcher::{Dispatcher, Executor};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestEvent(pub u64);

/// Collects values delivered to handlers, in delivery order.
#[derive(Debug)]
pub struct Recorder<V> {
    seen: Arc<Mutex<Vec<V>>>,
}

impl<V> Clone for Recorder<V> {
    fn clone(&self) -> Self {
        Self { seen: Arc::clone(&self.seen) }
    }
}

impl<V: Clone + Send + 'static> Recorder<V> {
    #[must_use]
    pub fn new() -> Self {
        Self { seen: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn push(&self, value: V) {
        self.seen.lock().push(value);
    }

    /// A handler that records every payload it receives.
    pub fn sink(&self) -> impl Fn(V) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |value| seen.lock().push(value)
    }

    /// A handler that records `tag` whatever the payload.
    pub fn tagged<P>(&self, tag: V) -> impl Fn(P) + Send + Sync + 'static
    where
        V: Sync,
    {
        let seen = Arc::clone(&self.seen);
        move |_| seen.lock().push(tag.clone())
    }

    /// Like [`Recorder::tagged`], sleeping for `delay` first.
    pub fn delayed<P>(&self, tag: V, delay: Duration) -> impl Fn(P) + Send + Sync + 'static
    where
        V: Sync,
    {
        let seen = Arc::clone(&self.seen);
        move |_| {
            std::thread::sleep(delay);
            seen.lock().push(tag.clone());
        }
    }

    #[must_use]
    pub fn values(&self) -> Vec<V> {
        self.seen.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

/// A dispatcher whose async deliveries run on plain threads.
#[must_use]
pub fn threaded<T: Clone + Send + 'static>(name: &'static str) -> Dispatcher<T> {
    Dispatcher::builder().name(name).executor(Executor::Threads).build()
}
