//! Bounded I/O executors.
//!
//! Resolution and action work may block on backing services, so it never runs
//! on the thread that hands a message to the pipeline. An [`IoExecutor`] is a
//! small pool of named worker threads fed by a bounded queue; submission
//! never blocks and reports backpressure as [`ExecutionError::QueueFull`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExecutionError;

/// A unit of work submitted to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorConfig {
    /// Pool name, used for thread names and errors.
    pub name: String,
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued jobs.
    pub queue_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "io".to_string(),
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

impl ExecutorConfig {
    /// Default sizing under a different name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A bounded pool of worker threads.
pub struct IoExecutor {
    name: String,
    queue_capacity: usize,
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl IoExecutor {
    /// Start the pool.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn a worker thread.
    #[must_use]
    pub fn start(config: &ExecutorConfig) -> Self {
        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let pool_name = config.name.clone();
            let thread_name = format!("relnode-{}-{idx}", config.name);
            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        // A panicking job must not take the worker down with it.
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            warn!(executor = %pool_name, "job panicked; worker continues");
                        }
                    }
                })
                .expect("failed to spawn relnode worker");
            handles.push(handle);
        }
        debug!(executor = %config.name, workers, queue_capacity, "executor started");

        Self {
            name: config.name.clone(),
            queue_capacity,
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job without blocking.
    pub fn execute(&self, job: Job) -> Result<(), ExecutionError> {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = tx.as_ref() else {
            return Err(ExecutionError::Disconnected {
                executor: self.name.clone(),
            });
        };
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(executor = %self.name, capacity = self.queue_capacity, "executor queue full");
                Err(ExecutionError::QueueFull {
                    executor: self.name.clone(),
                    capacity: self.queue_capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => Err(ExecutionError::Disconnected {
                executor: self.name.clone(),
            }),
        }
    }

    /// Queue a closure without blocking.
    pub fn spawn<F>(&self, f: F) -> Result<(), ExecutionError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(Box::new(f))
    }

    /// Stop accepting work, let workers drain the queue, and join them.
    /// Idempotent.
    pub fn shutdown(&self) {
        // Closing the channel lets workers finish queued jobs then exit.
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        let current = thread::current().id();
        for handle in workers {
            // A job that drops the last reference to its own executor must not join itself.
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        debug!(executor = %self.name, "executor stopped");
    }
}

impl std::fmt::Debug for IoExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoExecutor")
            .field("name", &self.name)
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

impl Drop for IoExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The executors a pipeline dispatches to: one for cache loads, one for
/// action hooks. They may be the same pool.
#[derive(Debug, Clone)]
pub struct Executors {
    /// Runs descriptor resolution (cache lookups and loads).
    pub resolve: Arc<IoExecutor>,
    /// Runs action hooks.
    pub action: Arc<IoExecutor>,
}

impl Executors {
    /// Separate pools for resolution and actions.
    #[must_use]
    pub fn new(resolve: Arc<IoExecutor>, action: Arc<IoExecutor>) -> Self {
        Self { resolve, action }
    }

    /// One pool for both.
    #[must_use]
    pub fn shared(executor: Arc<IoExecutor>) -> Self {
        Self {
            resolve: Arc::clone(&executor),
            action: executor,
        }
    }

    /// Start two pools with default sizing named `resolve` and `action`.
    #[must_use]
    pub fn start_default() -> Self {
        Self::new(
            Arc::new(IoExecutor::start(&ExecutorConfig::named("resolve"))),
            Arc::new(IoExecutor::start(&ExecutorConfig::named("action"))),
        )
    }
}
