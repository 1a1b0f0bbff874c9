use std::thread;
use std::time::Duration;

/// Progressive exponential nanosleep back-off for worker threads parked on
/// an empty task queue.
///
/// Platforms with a reliable wake-on-enqueue path (the `Waker` pipe/eventfd)
/// don't need this; it is the fallback used when a worker thread finds both
/// queues empty and has no other wake signal. Every call to
/// [`Backoff::reset`] (made whenever the queue becomes non-empty) collapses
/// the wait back to one nanosecond, so a thread that was sleeping through a
/// long idle stretch reacts promptly once work shows up again.
#[derive(Debug)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

const INITIAL: Duration = Duration::from_nanos(1);

impl Backoff {
    pub fn new(max: Duration) -> Backoff {
        Backoff {
            current: INITIAL,
            max,
        }
    }

    /// Sleeps for the current back-off duration, then doubles it (capped at
    /// `max`) for next time.
    pub fn snooze(&mut self) {
        thread::sleep(self.current);
        self.advance();
    }

    /// Returns the current wait duration without sleeping.
    ///
    /// Used together with `Thread::park_timeout` so a worker can be woken
    /// early by `unpark()` (the pipe-signal path) while still falling back
    /// to the nanosleep back-off as a timeout.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Doubles the back-off (capped at `max`) without sleeping.
    pub fn advance(&mut self) {
        self.current = (self.current * 2).min(self.max);
    }

    /// Collapses the back-off to its initial one-nanosecond duration.
    pub fn reset(&mut self) {
        self.current = INITIAL;
    }
}

impl Default for Backoff {
    fn default() -> Backoff {
        Backoff::new(Duration::from_millis(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let mut b = Backoff::new(Duration::from_nanos(8));
        assert_eq!(b.current, Duration::from_nanos(1));
        b.snooze();
        assert_eq!(b.current, Duration::from_nanos(2));
        b.snooze();
        assert_eq!(b.current, Duration::from_nanos(4));
        b.snooze();
        assert_eq!(b.current, Duration::from_nanos(8));
        b.snooze();
        assert_eq!(b.current, Duration::from_nanos(8));
    }

    #[test]
    fn reset_collapses_to_initial() {
        let mut b = Backoff::new(Duration::from_millis(1));
        b.snooze();
        b.snooze();
        b.reset();
        assert_eq!(b.current, Duration::from_nanos(1));
    }
}
