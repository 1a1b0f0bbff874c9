use crate::event::{self, Events};
use crate::{sys, Interest, Token};

use log::trace;
#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{fmt, io};

/// Polls for readiness events on all registered [`event::Source`]s.
///
/// A call to [`Poll::poll`] blocks the calling thread until either a source
/// becomes ready, `timeout` elapses, or the call is woken by a [`Waker`].
/// Sources are monitored via their associated [`Registry`], obtained with
/// [`Poll::registry`].
///
/// [`Waker`]: crate::Waker
pub struct Poll {
    registry: Registry,
}

/// Registers I/O sources with a [`Poll`] instance.
#[derive(Clone)]
pub struct Registry {
    selector: Arc<sys::Selector>,
}

/// Used to associate an I/O source with at most one [`Selector`], catching
/// bugs where the same source is registered with two different selectors.
///
/// [`Selector`]: sys::Selector
#[derive(Debug)]
pub struct SelectorId {
    #[cfg(debug_assertions)]
    id: AtomicUsize,
}

impl Poll {
    /// Returns a new `Poll` handle.
    ///
    /// This makes a syscall to create the backing OS selector (`epoll`,
    /// `kqueue`, or `poll` depending on the platform). If that syscall fails
    /// this returns the error.
    pub fn new() -> io::Result<Poll> {
        sys::Selector::new().map(|selector| Poll {
            registry: Registry {
                selector: Arc::new(selector),
            },
        })
    }

    /// Returns a reference to the associated [`Registry`].
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Blocks the current thread until at least one readiness event is
    /// received for a source registered with [`Registry`], or until
    /// `timeout` elapses. `timeout` of `None` means `poll` blocks until a
    /// readiness event is received.
    ///
    /// `events` is cleared before any new events are pushed into it. The
    /// number of events returned is at most `events.capacity()`.
    pub fn poll(&mut self, events: &mut Events, mut timeout: Option<Duration>) -> io::Result<()> {
        loop {
            let start = Instant::now();
            match self.registry.selector.select(events.sys(), timeout) {
                Ok(()) => return Ok(()),
                // The cycle loop relies on `poll` not returning spuriously on
                // a caught signal (SIGCHLD in particular fires constantly
                // while workers are alive), so retry with the remaining
                // budget instead of surfacing `EINTR` to the caller.
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {
                    if let Some(to) = timeout {
                        let elapsed = start.elapsed();
                        if elapsed >= to {
                            return Ok(());
                        }
                        timeout = Some(to - elapsed);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl fmt::Debug for Poll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poll").finish()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").finish()
    }
}

#[cfg(unix)]
impl AsRawFd for Poll {
    fn as_raw_fd(&self) -> RawFd {
        self.registry.selector.as_raw_fd()
    }
}

impl Registry {
    /// Registers `source` with this `Registry`, associating readiness events
    /// matching `interests` with `token`.
    ///
    /// See [`event::Source`] for details on what types can be registered.
    pub fn register<S>(&self, source: &mut S, token: Token, interests: Interest) -> io::Result<()>
    where
        S: event::Source + ?Sized,
    {
        trace!("registering source with poller");
        source.register(self, token, interests)
    }

    /// Re-registers `source`, updating the `token` and `interests` the
    /// source was previously registered with.
    pub fn reregister<S>(
        &self,
        source: &mut S,
        token: Token,
        interests: Interest,
    ) -> io::Result<()>
    where
        S: event::Source + ?Sized,
    {
        trace!("reregistering source with poller");
        source.reregister(self, token, interests)
    }

    /// Deregisters `source` from this `Registry`.
    ///
    /// Once deregistered, the backing selector will no longer return events
    /// for `source`. Sources are deregistered automatically when dropped, so
    /// most callers never need this.
    pub fn deregister<S>(&self, source: &mut S) -> io::Result<()>
    where
        S: event::Source + ?Sized,
    {
        trace!("deregistering source from poller");
        source.deregister(self)
    }
}

#[cfg(unix)]
impl AsRawFd for Registry {
    fn as_raw_fd(&self) -> RawFd {
        self.selector.as_raw_fd()
    }
}

/// Returns a reference to the selector backing `registry`, for use by
/// platform-specific extension types (e.g. [`SourceFd`]).
///
/// [`SourceFd`]: crate::unix::SourceFd
pub(crate) fn selector(registry: &Registry) -> &sys::Selector {
    &registry.selector
}

impl SelectorId {
    pub fn new() -> SelectorId {
        SelectorId {
            #[cfg(debug_assertions)]
            id: AtomicUsize::new(0),
        }
    }

    #[cfg(debug_assertions)]
    pub fn associate_selector(&self, registry: &Registry) -> io::Result<()> {
        let selector_id = self.id.load(Ordering::SeqCst);

        if selector_id != 0 && selector_id != registry.selector.id() {
            Err(io::Error::new(
                io::ErrorKind::Other,
                "I/O source already registered with a different `Registry`",
            ))
        } else {
            self.id.store(registry.selector.id(), Ordering::SeqCst);
            Ok(())
        }
    }

    #[cfg(not(debug_assertions))]
    pub fn associate_selector(&self, _registry: &Registry) -> io::Result<()> {
        Ok(())
    }
}

impl Clone for SelectorId {
    fn clone(&self) -> SelectorId {
        SelectorId {
            #[cfg(debug_assertions)]
            id: AtomicUsize::new(self.id.load(Ordering::SeqCst)),
        }
    }
}
