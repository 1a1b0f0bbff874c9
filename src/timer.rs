//! The timer wheel: a single list of one-shot/repeating timers
//! ordered by ascending due-tick, sampled once per reactor cycle against a
//! monotonic clock.
//!
//! `repetitions == 0` means "repeat forever", matching `fio_run_every`;
//! any other value counts down to zero, after which `on_finish` fires and
//! the entry is dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::queue::{Priority, Task, TaskQueue};
use crate::sync::{IntrusiveList, Spinlock};

/// Default ceiling on how long the poller is allowed to block when no timer
/// is due sooner; keeps an otherwise-idle process responsive to `stop()`.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(1);

/// `0` repeats forever (mirrors `fio_run_every`'s `repetitions == 0`
/// convention); any other value is a countdown.
const FOREVER: u32 = 0;

struct Entry {
    due: Instant,
    interval: Duration,
    remaining: u32,
    task: Arc<dyn Fn() + Send + Sync + 'static>,
    on_finish: Option<Box<dyn FnOnce() + Send + 'static>>,
}

/// A handle to a scheduled timer, usable to cancel it before it next fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(usize);

/// The ordered timer list. One per reactor; shared across worker threads.
#[derive(Debug)]
pub struct TimerWheel {
    entries: Spinlock<IntrusiveList<Entry>>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("due", &self.due)
            .field("interval", &self.interval)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl Default for TimerWheel {
    fn default() -> TimerWheel {
        TimerWheel::new()
    }
}

impl TimerWheel {
    pub fn new() -> TimerWheel {
        TimerWheel {
            entries: Spinlock::new(IntrusiveList::new()),
        }
    }

    /// Schedules `task` to run every `interval` starting `interval` from
    /// `now`, `repetitions` times (`0` = forever). `on_finish` runs once,
    /// after the last repetition or upon cancellation.
    pub fn run_every<F, G>(
        &self,
        now: Instant,
        interval: Duration,
        repetitions: u32,
        task: F,
        on_finish: Option<G>,
    ) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
        G: FnOnce() + Send + 'static,
    {
        let entry = Entry {
            due: now + interval,
            interval,
            remaining: repetitions,
            task: Arc::new(task),
            on_finish: on_finish.map(|f| Box::new(f) as Box<dyn FnOnce() + Send>),
        };
        TimerId(self.insert_sorted(entry))
    }

    fn insert_sorted(&self, entry: Entry) -> usize {
        let mut list = self.entries.lock();
        let insertion_point = list.iter().find(|(_, e)| e.due > entry.due).map(|(h, _)| h);
        match insertion_point {
            Some(before) => list.insert_before(before, entry),
            None => list.push_back(entry),
        }
    }

    /// Cancels a pending timer. Its `on_finish` still runs (matching
    /// `fio_run_every`'s "`on_finish` is always called, even on error/early
    /// stop" contract), enqueued immediately onto `queue`.
    pub fn cancel(&self, id: TimerId, queue: &TaskQueue) {
        let removed = {
            let mut list = self.entries.lock();
            list.get(id.0).is_some().then(|| list.remove(id.0))
        };
        if let Some(entry) = removed {
            if let Some(on_finish) = entry.on_finish {
                queue.push(Priority::Normal, Task::new(on_finish));
            }
        }
    }

    /// Returns how long the poller may block before the next timer comes
    /// due, capped at `DEFAULT_MAX_WAIT` so an idle process stays
    /// responsive.
    pub fn next_wait(&self, now: Instant) -> Duration {
        match self.entries.lock().front() {
            Some(entry) if entry.due > now => (entry.due - now).min(DEFAULT_MAX_WAIT),
            Some(_) => Duration::ZERO,
            None => DEFAULT_MAX_WAIT,
        }
    }

    /// Pops every timer due at or before `now`, enqueues its task onto
    /// `queue`'s normal priority, and re-schedules or retires each entry.
    ///
    /// Returns the number of timers fired, for the idle-transition logic in
    /// the reactor cycle (§4.F.3).
    pub fn fire_due(&self, now: Instant, queue: &TaskQueue) -> usize {
        let mut fired = 0;
        loop {
            let due_handle = {
                let list = self.entries.lock();
                match list.front() {
                    Some(entry) if entry.due <= now => list.iter().next().map(|(h, _)| h),
                    _ => None,
                }
            };
            let Some(handle) = due_handle else { break };
            let entry = self.entries.lock().remove(handle);
            fired += 1;

            let task_fn = Arc::clone(&entry.task);
            queue.push(Priority::Normal, Task::new(move || task_fn()));

            let next_remaining = if entry.remaining == FOREVER {
                FOREVER
            } else {
                entry.remaining - 1
            };
            if entry.remaining == FOREVER || next_remaining > 0 {
                self.insert_sorted(Entry {
                    due: now + entry.interval,
                    interval: entry.interval,
                    remaining: next_remaining,
                    task: entry.task,
                    on_finish: entry.on_finish,
                });
            } else if let Some(on_finish) = entry.on_finish {
                queue.push(Priority::Normal, Task::new(on_finish));
            }
        }
        fired
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().len() == 0
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_every_fires_exact_repetition_count_then_on_finish() {
        let wheel = TimerWheel::new();
        let queue = TaskQueue::new();
        let start = Instant::now();
        let fires = Arc::new(AtomicUsize::new(0));
        let finishes = Arc::new(AtomicUsize::new(0));

        {
            let fires = Arc::clone(&fires);
            let finishes = Arc::clone(&finishes);
            wheel.run_every(
                start,
                Duration::from_millis(100),
                5,
                move || {
                    fires.fetch_add(1, Ordering::SeqCst);
                },
                Some(move || {
                    finishes.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        // Advance simulated time by 600ms in 100ms steps, firing whatever is due.
        let mut now = start;
        for _ in 0..6 {
            now += Duration::from_millis(100);
            wheel.fire_due(now, &queue);
        }
        queue.perform_all();

        assert_eq!(fires.load(Ordering::SeqCst), 5);
        assert_eq!(finishes.load(Ordering::SeqCst), 1);
        assert!(wheel.is_empty());
    }

    #[test]
    fn forever_repeats_until_cancelled() {
        let wheel = TimerWheel::new();
        let queue = TaskQueue::new();
        let start = Instant::now();
        let fires = Arc::new(AtomicUsize::new(0));

        let id = {
            let fires = Arc::clone(&fires);
            wheel.run_every::<_, fn()>(start, Duration::from_millis(10), 0, move || {
                fires.fetch_add(1, Ordering::SeqCst);
            }, None)
        };

        let mut now = start;
        for _ in 0..20 {
            now += Duration::from_millis(10);
            wheel.fire_due(now, &queue);
        }
        queue.perform_all();
        assert_eq!(fires.load(Ordering::SeqCst), 20);

        wheel.cancel(id, &queue);
        assert!(wheel.is_empty());
    }

    #[test]
    fn earlier_due_timer_enqueues_no_later_than_a_later_one() {
        let wheel = TimerWheel::new();
        let queue = TaskQueue::new();
        let start = Instant::now();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        {
            let order = Arc::clone(&order);
            wheel.run_every::<_, fn()>(start, Duration::from_millis(50), 1, move || {
                order.lock().unwrap().push("t2");
            }, None);
        }
        {
            let order = Arc::clone(&order);
            wheel.run_every::<_, fn()>(start, Duration::from_millis(10), 1, move || {
                order.lock().unwrap().push("t1");
            }, None);
        }

        wheel.fire_due(start + Duration::from_millis(100), &queue);
        queue.perform_all();
        assert_eq!(*order.lock().unwrap(), vec!["t1", "t2"]);
    }
}
