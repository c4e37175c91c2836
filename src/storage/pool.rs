//! Fixed-size worker pool
//!
//! Runs partition commits concurrently. Workers pull boxed jobs from a shared
//! crossbeam channel; dropping the sender lets them drain and exit.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::error::{KvError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `size` workers named `{name}-{n}`
    pub fn new(name: &str, size: usize) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);

        for n in 0..size.max(1) {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, n))
                .spawn(move || {
                    for job in receiver.iter() {
                        // A panicking job must not take the worker down with it
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::warn!("Worker job panicked");
                        }
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    /// Queue a job; fails once the pool is shut down
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(KvError::Closed)?;
        sender
            .send(Box::new(job))
            .map_err(|_| KvError::Storage(format!("worker pool {} disconnected", self.name)))
    }

    /// Stop accepting jobs, let queued ones finish, join the workers
    pub fn shutdown(&self) {
        self.sender.lock().take();

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.thread().id() == thread::current().id() {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("Worker in pool {} exited abnormally", self.name);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
