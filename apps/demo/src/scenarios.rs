use anyhow::ensure;
use herald_dispatcher::{Dispatcher, Executor};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const EVENTS_PER_PUBLISHER: usize = 250;

/// Two persistent handlers and a one-shot one; the first is unsubscribed between dispatches.
pub(crate) fn basic() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::<String>::builder().name("greetings").build();

    let first = dispatcher.subscribe(|msg| tracing::info!(%msg, "Subscriber 1"));
    dispatcher.subscribe(|msg| tracing::info!(%msg, "Subscriber 2"));
    dispatcher.subscribe_once(|msg| tracing::info!(%msg, "Subscriber 3 (once)"));

    let delivered = dispatcher.dispatch("Hello".to_owned())?;
    tracing::info!(delivered, "First dispatch done");

    ensure!(first.unsubscribe(), "subscriber 1 was already gone");
    let delivered = dispatcher.dispatch("World".to_owned())?;
    tracing::info!(delivered, remaining = dispatcher.len(), "Second dispatch done");

    dispatcher.wait();
    Ok(())
}

/// Five once-only transactional handlers: delivered in registration order, then gone.
pub(crate) fn transactional() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::<u32>::builder().name("ledger").executor(Executor::Threads).build();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for slot in 1..=5_u32 {
        let seen = Arc::clone(&seen);
        dispatcher.subscribe_once_async(
            move |value| {
                tracing::info!(slot, value, "Transactional handler");
                seen.lock().push(slot);
            },
            true,
        );
    }

    let delivered = dispatcher.dispatch(42)?;
    let order = seen.lock().clone();
    tracing::info!(delivered, ?order, "Transactional dispatch done");
    ensure!(order == [1, 2, 3, 4, 5], "handlers ran out of order: {order:?}");

    let delivered = dispatcher.dispatch(43)?;
    ensure!(delivered == 0, "once handlers fired twice");

    dispatcher.wait();
    Ok(())
}

/// Publishers on several threads feed detached handlers; `wait` joins all of them.
pub(crate) fn concurrent(publishers: usize) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::<usize>::builder().name("metrics").executor(Executor::Threads).build();
    let received = Arc::new(AtomicUsize::new(0));
    let sum = Arc::new(AtomicUsize::new(0));

    {
        let received = Arc::clone(&received);
        dispatcher.subscribe_async(
            move |_| {
                received.fetch_add(1, Ordering::Relaxed);
            },
            false,
        );
    }
    {
        let sum = Arc::clone(&sum);
        dispatcher.subscribe(move |value| {
            sum.fetch_add(value, Ordering::Relaxed);
        });
    }

    let handles: Vec<_> = (0..publishers)
        .map(|publisher| {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || -> anyhow::Result<()> {
                for seq in 0..EVENTS_PER_PUBLISHER {
                    dispatcher.dispatch(publisher * EVENTS_PER_PUBLISHER + seq)?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().map_err(|_| anyhow::anyhow!("publisher thread panicked"))??;
    }
    dispatcher.wait();

    let total = publishers * EVENTS_PER_PUBLISHER;
    let received = received.load(Ordering::Relaxed);
    tracing::info!(publishers, total, received, sum = sum.load(Ordering::Relaxed), "Concurrent dispatch done");
    ensure!(received == total, "expected {total} detached deliveries, got {received}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_runs() {
        basic().unwrap();
    }

    #[test]
    fn test_transactional_runs() {
        transactional().unwrap();
    }

    #[test]
    fn test_concurrent_runs() {
        concurrent(3).unwrap();
    }
}
