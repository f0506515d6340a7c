use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size thread pool executing asynchronous handler invocations.
///
/// The pool is an explicit dependency of the channel rather than an ambient
/// executor, so its size and shutdown are owned by whoever owns the
/// channel. Dropping the pool stops accepting jobs and joins the workers.
pub struct WorkerPool {
    tx: Mutex<Option<Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn a pool with `threads` workers (at least one).
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::new();
        for i in 0..threads.max(1) {
            let rx = Arc::clone(&rx);
            let handle = std::thread::Builder::new()
                .name(format!("hostlink-worker-{i}"))
                .spawn(move || loop {
                    let job = {
                        let guard = rx.lock().unwrap_or_else(|p| p.into_inner());
                        guard.recv()
                    };
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        })
    }

    /// Submit a job for execution on some worker thread.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        let guard = self.tx.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(Box::new(job)).is_err() {
                    warn!("worker pool shutting down; dropping job");
                }
            }
            None => warn!("worker pool already shut down; dropping job"),
        }
    }

    /// Stop accepting jobs and join all worker threads.
    ///
    /// A job may hold the last handle to the pool, in which case shutdown
    /// runs on a worker thread. That thread is skipped instead of joined; it
    /// exits on its own once the sender is gone.
    pub fn shutdown(&self) {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        drop(tx);

        let current = std::thread::current().id();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|p| p.into_inner()));
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn executes_submitted_jobs() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn jobs_run_off_the_submitting_thread() {
        let pool = WorkerPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();
        let submitter = std::thread::current().id();

        pool.execute(move || {
            let _ = tx.send(std::thread::current().id());
        });

        let worker = rx.recv().unwrap();
        assert_ne!(worker, submitter);
    }

    #[test]
    fn worker_may_drop_the_last_pool_handle() {
        let pool = Arc::new(WorkerPool::new(1).unwrap());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();

        let held = Arc::clone(&pool);
        pool.execute(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            // Last handle goes away on the worker thread itself.
            drop(held);
            let _ = done_tx.send(());
        });

        started_rx.recv().unwrap();
        drop(pool);
        release_tx.send(()).unwrap();
        assert!(
            done_rx
                .recv_timeout(std::time::Duration::from_secs(5))
                .is_ok(),
            "dropping the pool from a worker must not deadlock"
        );
    }

    #[test]
    fn execute_after_shutdown_is_dropped() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        // Must not panic or hang.
        pool.execute(|| {});
    }
}
