//! The two-priority deferred-task queue.
//!
//! `urgent` tasks (write-ready flushes) always drain before `normal` tasks
//! (on-data, timers, pub/sub dispatch) within one [`TaskQueue::perform_all`]
//! call, and FIFO order is preserved within each priority. There is no
//! cross-thread ordering guarantee beyond "enqueue happens-before the
//! callback runs".

mod block;
mod worker;

pub use worker::WorkerPool;

use block::BlockChain;
use crate::sync::Spinlock;

/// A unit of deferred work: an owned closure run exactly once by a worker
/// thread. Corresponds to the C core's `{function, arg1, arg2}` triple;
/// a boxed `FnOnce` closure captures the same state idiomatically.
pub struct Task(Box<dyn FnOnce() + Send + 'static>);

impl Task {
    pub fn new<F>(f: F) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        Task(Box::new(f))
    }

    pub fn run(self) {
        (self.0)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// Relative dispatch priority. `Urgent` always drains before `Normal` at
/// each [`TaskQueue::perform_all`] step (write-ready flushes ahead of
/// on-data/timers/pub-sub dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Urgent,
    Normal,
}

/// The pair of priority queues one reactor (or one worker process) drains.
#[derive(Debug)]
pub struct TaskQueue {
    urgent: Spinlock<BlockChain>,
    normal: Spinlock<BlockChain>,
}

impl std::fmt::Debug for BlockChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockChain").field("len", &self.len()).finish()
    }
}

impl Default for TaskQueue {
    fn default() -> TaskQueue {
        TaskQueue::new()
    }
}

impl TaskQueue {
    pub fn new() -> TaskQueue {
        TaskQueue {
            urgent: Spinlock::new(BlockChain::new()),
            normal: Spinlock::new(BlockChain::new()),
        }
    }

    /// Enqueues `task` at the given priority.
    pub fn push(&self, priority: Priority, task: Task) {
        match priority {
            Priority::Urgent => self.urgent.lock().push(task),
            Priority::Normal => self.normal.lock().push(task),
        }
    }

    /// Number of tasks currently queued across both priorities.
    pub fn len(&self) -> usize {
        self.urgent.lock().len() + self.normal.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pop_urgent(&self) -> Option<Task> {
        self.urgent.lock().pop()
    }

    fn pop_normal(&self) -> Option<Task> {
        self.normal.lock().pop()
    }

    /// Drains urgent-then-normal repeatedly until both queues are empty.
    ///
    /// A normal-priority task (e.g. an on-data callback) may enqueue more
    /// urgent work (a reply write); looping until a full pass finds nothing
    /// left ensures that work is not stranded until the next poller wakeup.
    pub fn perform_all(&self) {
        loop {
            let mut ran_any = false;
            while let Some(task) = self.pop_urgent() {
                task.run();
                ran_any = true;
            }
            while let Some(task) = self.pop_normal() {
                task.run();
                ran_any = true;
            }
            if !ran_any {
                break;
            }
        }
    }

    /// Drops every queued task without running it. Used by a freshly forked
    /// worker to discard work inherited from the parent's pre-fork queues.
    pub fn clear(&self) {
        self.urgent.lock().clear();
        self.normal.lock().clear();
    }
}
