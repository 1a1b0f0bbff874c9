//! The per-process event cycle: one dedicated thread owns the
//! `Poll` instance (mio requires `&mut self` to poll) and drives readiness
//! dispatch, due timers and the timeout walker; actual callback bodies run
//! on the worker pool via the task queue, never on this thread.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::event::Events;
use crate::reactor::Reactor;

const EVENTS_CAPACITY: usize = 1024;
const TIMEOUT_REVIEW_INTERVAL: Duration = Duration::from_secs(1);

/// Runs the cycle loop until `reactor.stop()` clears the running flag.
/// Takes the `Poll` the reactor was constructed with; it is never handed
/// back, since only this thread ever drives it.
pub(super) fn run(reactor: &Arc<Reactor>) {
    let Some(mut poll) = reactor.take_poll() else {
        log::error!("reactor cycle started twice or without a poller");
        return;
    };
    let mut events = Events::with_capacity(EVENTS_CAPACITY);
    let mut last_timeout_review = Instant::now();

    while reactor.is_running() {
        if reactor.signal_flags().stop_requested.load(Ordering::Acquire) {
            break;
        }

        let now = Instant::now();
        let wait = reactor.timers().next_wait(now);
        if let Err(err) = poll.poll(&mut events, Some(wait)) {
            log::error!("poll failed: {err}");
            continue;
        }

        let now = Instant::now();
        reactor.set_last_tick(now);

        let was_idle = events.is_empty();
        if reactor.mark_idle(was_idle) && was_idle {
            reactor.fire_idle();
        }

        for event in events.iter() {
            let fd = event.token().0 as std::os::unix::io::RawFd;
            let Some(uuid) = reactor.table().uuid_for_fd(fd) else {
                continue;
            };
            if event.is_error() || event.is_hup() {
                reactor.force_close(uuid);
                continue;
            }
            if event.is_writable() {
                reactor.dispatch_writable(uuid);
            }
            if event.is_readable() {
                reactor.dispatch_readable(uuid);
            }
        }

        let fired = reactor.timers().fire_due(now, reactor.queue());
        if fired > 0 {
            log::trace!("{fired} timers fired");
        }

        if reactor.review_timeouts() && now.duration_since(last_timeout_review) >= TIMEOUT_REVIEW_INTERVAL {
            last_timeout_review = now;
            reactor.walk_timeouts(now);
        }
    }
}
