use crate::completion::panic_message;
use crate::error::{DispatcherError, DispatcherErrorExt};
use parking_lot::Mutex;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;
use tracing::{error, warn};

/// Where async deliveries run.
///
/// Callbacks are plain blocking closures, so both variants give each delivery a
/// thread of its own and never occupy an async worker.
#[derive(Debug, Clone)]
pub enum Executor {
    /// The blocking pool of a Tokio runtime.
    ///
    /// A job the pool drops without running, because the runtime has shut down,
    /// moves to a dedicated OS thread instead.
    Tokio(Handle),
    /// A dedicated, named OS thread per delivery.
    Threads,
}

impl Executor {
    /// Uses the Tokio runtime the caller is running in, or plain threads outside one.
    #[must_use]
    pub fn detect() -> Self {
        Handle::try_current().map_or(Self::Threads, Self::Tokio)
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Tokio(_) => "tokio",
            Self::Threads => "threads",
        }
    }

    /// Schedules `job`. If scheduling fails the job is dropped without running.
    ///
    /// Both variants report a failed thread spawn as [`DispatcherError::Spawn`];
    /// for Tokio that is the blocking pool panicking because the OS refused a thread.
    pub(crate) fn spawn<F>(&self, thread_name: &str, job: F) -> Result<(), DispatcherError>
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Tokio(handle) => {
                let rescue = Rescue::new(thread_name, job);
                let slot = Arc::clone(&rescue.slot);
                let scheduled =
                    catch_unwind(AssertUnwindSafe(|| drop(handle.spawn_blocking(move || rescue.run()))));

                match scheduled {
                    Ok(()) => Ok(()),
                    Err(panic) => {
                        // Still in the slot means neither the pool nor a rescue thread owns it.
                        let reclaimed = slot.lock().take();
                        match reclaimed {
                            Some(job) => {
                                drop(job);
                                Err(DispatcherError::Spawn {
                                    source: io::Error::other(panic_message(panic.as_ref())),
                                    context: Some(
                                        format!("Scheduling '{thread_name}' on the Tokio blocking pool").into(),
                                    ),
                                })
                            },
                            None => Ok(()),
                        }
                    },
                }
            },
            Self::Threads => spawn_thread(thread_name, job),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::detect()
    }
}

fn spawn_thread<F>(thread_name: &str, job: F) -> Result<(), DispatcherError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(thread_name.to_owned())
        .spawn(job)
        .map(drop)
        .context(format!("Spawning thread '{thread_name}'"))
}

/// A job handed to the Tokio blocking pool.
///
/// Whoever takes the job out of the slot first runs it: the pool task, the
/// fallback thread started on drop, or the caller reclaiming it after a failed
/// spawn. The job therefore runs at most once.
struct Rescue<F: FnOnce() + Send + 'static> {
    slot: Arc<Mutex<Option<F>>>,
    thread_name: String,
}

impl<F: FnOnce() + Send + 'static> Rescue<F> {
    fn new(thread_name: &str, job: F) -> Self {
        Self { slot: Arc::new(Mutex::new(Some(job))), thread_name: thread_name.to_owned() }
    }

    fn run(self) {
        let job = self.slot.lock().take();
        if let Some(job) = job {
            job();
        }
    }
}

impl<F: FnOnce() + Send + 'static> Drop for Rescue<F> {
    fn drop(&mut self) {
        let job = self.slot.lock().take();
        let Some(job) = job else { return };

        warn!(thread = %self.thread_name, "Tokio runtime dropped an async delivery; moving it to a dedicated thread");
        if let Err(err) = spawn_thread(&self.thread_name, job) {
            error!(thread = %self.thread_name, %err, "Async delivery lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_detect_outside_runtime_uses_threads() {
        assert_eq!(Executor::detect().kind(), "threads");
    }

    #[tokio::test]
    async fn test_detect_inside_runtime_uses_tokio() {
        assert_eq!(Executor::detect().kind(), "tokio");
    }

    #[test]
    fn test_threads_run_on_named_thread() {
        let (tx, rx) = mpsc::channel();
        Executor::Threads
            .spawn("herald-test", move || {
                let name = thread::current().name().map(str::to_owned);
                tx.send(name).unwrap();
            })
            .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("herald-test"));
    }

    #[tokio::test]
    async fn test_tokio_runs_on_blocking_pool() {
        let (tx, rx) = mpsc::channel();
        Executor::detect().spawn("unused", move || tx.send(7).unwrap()).unwrap();

        let value = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_shut_down_runtime_falls_back_to_thread() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let executor = Executor::Tokio(runtime.handle().clone());
        drop(runtime);

        let (tx, rx) = mpsc::channel();
        executor
            .spawn("herald-rescue", move || {
                let name = thread::current().name().map(str::to_owned);
                tx.send(name).unwrap();
            })
            .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("herald-rescue"));
    }

    #[test]
    fn test_dropped_rescue_runs_job_once() {
        let (tx, rx) = mpsc::channel();
        drop(Rescue::new("herald-dropped", move || tx.send(1).unwrap()));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_reclaimed_job_is_not_rescued() {
        let (tx, rx) = mpsc::channel::<u8>();
        let rescue = Rescue::new("herald-reclaimed", move || tx.send(1).unwrap());

        let reclaimed = rescue.slot.lock().take();
        assert!(reclaimed.is_some());
        drop(rescue);
        drop(reclaimed);

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
