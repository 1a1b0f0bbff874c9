//! Worker process supervision.
//!
//! One sentinel thread per configured worker process: it `fork`s, runs
//! `entry` in the child (the worker's own reactor startup), and blocks in
//! `waitpid` in the parent. An unexpected child exit is respawned in
//! release builds; in debug builds the whole reactor is stopped instead,
//! on the theory that a crashing worker during development deserves an
//! immediate, loud failure rather than a respawn loop masking it.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::sync::Spinlock;

/// The worker-process entry point, run after `fork()` returns zero.
pub type ChildEntry = Arc<dyn Fn() + Send + Sync>;

/// One sentinel thread per worker process.
#[derive(Debug)]
pub struct WorkerSupervisor {
    sentinels: Vec<thread::JoinHandle<()>>,
}

impl WorkerSupervisor {
    /// Spawns `count` sentinel threads, each forking one worker process
    /// running `entry`. `fork_lock` serializes the actual `fork(2)` calls
    /// across sentinels (spec: "hold a fork-lock while forking").
    pub fn spawn(count: usize, fork_lock: Arc<Spinlock<()>>, running: Arc<AtomicBool>, entry: ChildEntry) -> WorkerSupervisor {
        let mut sentinels = Vec::with_capacity(count);
        for i in 0..count {
            let fork_lock = Arc::clone(&fork_lock);
            let running = Arc::clone(&running);
            let entry = Arc::clone(&entry);
            let handle = thread::Builder::new()
                .name(format!("revio-sentinel-{i}"))
                .spawn(move || sentinel_loop(fork_lock, running, entry))
                .expect("failed to spawn worker sentinel thread");
            sentinels.push(handle);
        }
        WorkerSupervisor { sentinels }
    }

    /// Blocks until every sentinel (and so every worker it supervises) has
    /// exited.
    pub fn join(self) {
        for sentinel in self.sentinels {
            let _ = sentinel.join();
        }
    }

    pub fn len(&self) -> usize {
        self.sentinels.len()
    }
}

fn sentinel_loop(fork_lock: Arc<Spinlock<()>>, running: Arc<AtomicBool>, entry: ChildEntry) {
    while running.load(Ordering::Acquire) {
        let pid = {
            let _guard = fork_lock.lock();
            unsafe { libc::fork() }
        };
        match pid {
            -1 => {
                log::error!(
                    "failed to fork worker process: {}",
                    std::io::Error::last_os_error()
                );
                running.store(false, Ordering::Release);
                return;
            }
            0 => {
                entry();
                process::exit(0);
            }
            child_pid => {
                let mut status: libc::c_int = 0;
                unsafe {
                    libc::waitpid(child_pid, &mut status, 0);
                }
                if !running.load(Ordering::Acquire) {
                    return;
                }
                if cfg!(debug_assertions) {
                    log::warn!("worker {child_pid} exited unexpectedly; stopping reactor (debug build)");
                    running.store(false, Ordering::Release);
                    return;
                }
                log::warn!("worker {child_pid} exited unexpectedly; respawning");
            }
        }
    }
}
