use std::{
    io,
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::warn;

/// Upper bound on how long deactivation waits for one adapter thread.
pub(crate) const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A named adapter thread that can be joined with a bounded wait.
#[derive(Debug)]
pub(crate) struct Worker {
    name: String,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl Worker {
    pub(crate) fn spawn<F>(name: &str, body: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done) = mpsc::channel();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            body();
            let _ = done_tx.send(());
        })?;

        Ok(Self {
            name: name.to_string(),
            handle,
            done,
        })
    }

    /// Waits up to `timeout` for the thread to finish, then joins it. On
    /// timeout the thread is detached. Returns whether it was joined.
    pub(crate) fn join_within(self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            // Disconnected means the body panicked before signalling.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    warn!("input thread '{}' panicked", self.name);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "input thread '{}' did not stop within {:?}, detaching",
                    self.name, timeout
                );
                false
            }
        }
    }
}

/// Joins every worker in `workers`, leaving the vector empty.
pub(crate) fn join_all(workers: &mut Vec<Worker>) {
    for worker in workers.drain(..) {
        worker.join_within(JOIN_TIMEOUT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    #[test]
    fn test_joins_finished_thread() {
        let worker = Worker::spawn("quick", || {}).unwrap();
        assert!(worker.join_within(Duration::from_secs(1)));
    }

    #[test]
    fn test_detaches_thread_that_overstays() {
        let release = Arc::new(AtomicBool::new(false));
        let flag = release.clone();
        let worker = Worker::spawn("slow", move || {
            while !flag.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(5));
            }
        })
        .unwrap();

        assert!(!worker.join_within(Duration::from_millis(20)));
        release.store(true, Ordering::Release);
    }

    #[test]
    fn test_panicking_body_still_counts_as_stopped() {
        let worker = Worker::spawn("boom", || panic!("read failed")).unwrap();
        assert!(worker.join_within(Duration::from_secs(1)));
    }
}
