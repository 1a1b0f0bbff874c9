//! The worker thread pool draining a [`TaskQueue`].
//!
//! Each thread loops `perform_all`, then parks. `Thread::park_timeout`
//! covers both wake paths: an `unpark()` call from an enqueuer wakes it
//! immediately, and the timeout itself is a back-off for situations where
//! no one calls `unpark` promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

use super::TaskQueue;
use crate::sync::Backoff;

/// A fixed-size pool of threads draining a shared [`TaskQueue`].
#[derive(Debug)]
pub struct WorkerPool {
    threads: Vec<JoinHandle<()>>,
    handles: Vec<Thread>,
    running: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns `count` threads named `{name_prefix}-{i}`, each draining
    /// `queue` until `running` is cleared.
    pub fn spawn(
        name_prefix: &str,
        count: usize,
        queue: Arc<TaskQueue>,
        running: Arc<AtomicBool>,
        max_backoff: Duration,
    ) -> WorkerPool {
        let mut threads = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            let handle = thread::Builder::new()
                .name(format!("{name_prefix}-{i}"))
                .spawn(move || worker_loop(queue, running, max_backoff))
                .expect("failed to spawn reactor worker thread");
            handles.push(handle.thread().clone());
            threads.push(handle);
        }
        WorkerPool {
            threads,
            handles,
            running,
        }
    }

    /// Wakes every idle worker immediately, bypassing the nanosleep back-off.
    /// Called whenever a task is pushed onto a queue that might be empty.
    pub fn wake_all(&self) {
        for thread in &self.handles {
            thread.unpark();
        }
    }

    /// Blocks until every worker thread has exited.
    ///
    /// Callers must clear `running` (or otherwise guarantee `is_running()`
    /// observes false) before calling this, or it blocks forever.
    pub fn join(self) {
        self.running.store(false, Ordering::Release);
        self.wake_all();
        for handle in self.threads {
            let _ = handle.join();
        }
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }
}

fn worker_loop(queue: Arc<TaskQueue>, running: Arc<AtomicBool>, max_backoff: Duration) {
    let mut backoff = Backoff::new(max_backoff);
    while running.load(Ordering::Acquire) {
        queue.perform_all();
        if queue.is_empty() {
            thread::park_timeout(backoff.current());
            backoff.advance();
        } else {
            backoff.reset();
        }
    }
    // Drain whatever arrived between the last `is_empty` check and the
    // `running` flag going false, so shutdown does not drop in-flight work.
    queue.perform_all();
}
