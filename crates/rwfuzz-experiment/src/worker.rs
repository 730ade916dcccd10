//! Fixed-size worker pool.
//!
//! Workers pull boxed jobs from a shared crossbeam channel. A batch is
//! gated by a [`WaitGroup`]: each job carries a clone and the caller blocks
//! until every clone is dropped.

use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use crossbeam::sync::WaitGroup;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers. At least one is always requested.
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size.max(1));
        for i in 0..size.max(1) {
            let receiver = receiver.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("rwfuzz-worker-{}", i))
                .spawn(move || {
                    for job in receiver.iter() {
                        job();
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => tracing::warn!(worker = i, error = %err, "failed to start worker"),
            }
        }
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Number of live workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue one job. Runs it on the caller's thread if no worker is
    /// available.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(job);
        let job = match &self.sender {
            Some(sender) if !self.workers.is_empty() => match sender.send(job) {
                Ok(()) => return,
                Err(rejected) => rejected.into_inner(),
            },
            _ => job,
        };
        job();
    }

    /// Run every job and block until all of them have finished.
    pub fn run_batch<I, F>(&self, jobs: I)
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() + Send + 'static,
    {
        let wg = WaitGroup::new();
        for job in jobs {
            let wg = wg.clone();
            self.execute(move || {
                job();
                drop(wg);
            });
        }
        wg.wait();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker's receive loop.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_batch_waits_for_every_job() {
        let pool = WorkerPool::new(4);
        let done = Arc::new(AtomicUsize::new(0));
        pool.run_batch((0..50).map(|_| {
            let done = Arc::clone(&done);
            move || {
                std::thread::sleep(Duration::from_millis(1));
                done.fetch_add(1, Ordering::SeqCst);
            }
        }));
        assert_eq!(done.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_concurrency_bounded_by_size() {
        let pool = WorkerPool::new(3);
        let threads = Arc::new(Mutex::new(HashSet::new()));
        pool.run_batch((0..30).map(|_| {
            let threads = Arc::clone(&threads);
            move || {
                std::thread::sleep(Duration::from_millis(2));
                threads.lock().unwrap().insert(std::thread::current().id());
            }
        }));
        let seen = threads.lock().unwrap().len();
        assert!(seen >= 1 && seen <= 3);
    }

    #[test]
    fn test_empty_batch_returns() {
        let pool = WorkerPool::new(2);
        pool.run_batch(Vec::<fn()>::new());
        assert_eq!(pool.size(), 2);
    }
}
