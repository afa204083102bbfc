//! Background polling thread with cooperative cancellation.
//!
//! A `PollWorker` runs a body repeatedly on its own named thread. The body
//! returns how long to wait before the next run; the wait is a crossbeam
//! `select!` over the stop channel, so a stop request is seen as soon as the
//! current body run finishes. A body blocked on network I/O is not interrupted;
//! `stop` gives up waiting after a bounded timeout and detaches the thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select};
use log::{debug, warn};
use stock_common::{FeedError, Result};

/// How long `stop` waits for a worker to exit by default.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to a running polling thread.
pub struct PollWorker {
    name: String,
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

impl PollWorker {
    /// Spawns a thread that waits `initial_delay`, then runs `body` until stopped.
    ///
    /// Each run of `body` returns the delay before the next one.
    pub fn spawn<F>(name: &str, initial_delay: Duration, mut body: F) -> Result<Self>
    where
        F: FnMut() -> Duration + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let thread_name = name.to_string();

        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            debug!("Worker {} started", thread_name);
            let mut delay = initial_delay;
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    default(delay) => {}
                }
                delay = body();
            }
            debug!("Worker {} finished", thread_name);
            let _ = done_tx.send(());
        })?;

        Ok(PollWorker {
            name: name.to_string(),
            stop_tx,
            done_rx,
            handle,
        })
    }

    /// Worker thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signals the worker and waits up to `timeout` for it to exit.
    ///
    /// A worker still busy after `timeout` is detached with a warning; it exits on
    /// its own once its current run returns.
    pub fn stop(self, timeout: Duration) -> Result<()> {
        let _ = self.stop_tx.try_send(());
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) => self
                .handle
                .join()
                .map_err(|_| FeedError::Format(format!("worker {} panicked", self.name))),
            Err(RecvTimeoutError::Timeout) => {
                warn!("Worker {} did not stop within {:?}, detaching", self.name, timeout);
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = self.handle.join();
                Err(FeedError::ChannelRecv(format!("worker {} exited abnormally", self.name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn runs_body_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let worker = PollWorker::spawn("test-worker", Duration::ZERO, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Duration::from_millis(5)
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while runs.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        worker.stop(DEFAULT_JOIN_TIMEOUT).unwrap();
        let after_stop = runs.load(Ordering::SeqCst);
        assert!(after_stop >= 3);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn stop_interrupts_long_wait() {
        let worker = PollWorker::spawn("idle-worker", Duration::from_secs(3600), || {
            Duration::from_secs(3600)
        })
        .unwrap();
        let started = Instant::now();
        worker.stop(DEFAULT_JOIN_TIMEOUT).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stop_detaches_busy_worker() {
        let worker = PollWorker::spawn("busy-worker", Duration::ZERO, || {
            thread::sleep(Duration::from_millis(300));
            Duration::ZERO
        })
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        worker.stop(Duration::from_millis(50)).unwrap();
        assert!(started.elapsed() < Duration::from_millis(250));
    }
}
