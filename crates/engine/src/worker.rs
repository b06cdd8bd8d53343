use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use merchkit_events::{EventBus, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Background loop that drains a bus subscription into a handler.
///
/// - Applies an idempotent handler for each message
/// - Retryable failures are logged and the loop continues
/// - Supports graceful shutdown
#[derive(Debug)]
pub struct EngineWorker;

impl EngineWorker {
    /// Spawn a worker thread that processes messages from the bus.
    ///
    /// `handler` must be idempotent (at-least-once delivery safe).
    pub fn spawn<M, B, H, E>(name: &'static str, bus: B, mut handler: H) -> WorkerHandle
    where
        M: Send + 'static,
        B: EventBus<M> + Send + Sync + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, &mut handler))
            .expect("failed to spawn engine worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    handler: &mut H,
) where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "engine worker handler failed");
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use merchkit_events::InMemoryEventBus;

    use super::*;

    #[test]
    fn worker_processes_published_messages() {
        let bus = Arc::new(InMemoryEventBus::<u32>::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let handle = EngineWorker::spawn("test-worker", Arc::clone(&bus), move |n: u32| {
            counter.fetch_add(n as usize, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        bus.publish(1).unwrap();
        bus.publish(2).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while seen.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn handler_failure_does_not_stop_the_loop() {
        let bus = Arc::new(InMemoryEventBus::<u32>::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let handle = EngineWorker::spawn("flaky-worker", Arc::clone(&bus), move |n: u32| {
            if n == 0 {
                return Err("boom");
            }
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(0).unwrap();
        bus.publish(1).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while seen.load(Ordering::SeqCst) < 1 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
