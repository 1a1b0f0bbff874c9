//! An evented, multi-process network reactor.
//!
//! This crate provides the concurrency primitives, task queue, timer wheel,
//! OS-backed poller, connection table and inter-process pub/sub fabric that
//! together make up a reactor core: a handful of worker processes, each
//! running an event loop over non-blocking sockets, sharing readiness-driven
//! dispatch and a lock-free(ish) task queue.
//!
//! The [`event`], [`net`], [`Poll`], [`Registry`], [`Token`], [`Interest`] and
//! [`Waker`] types are the low-level OS-poller layer the rest of the crate is
//! built on. Most applications will instead reach for [`reactor::Reactor`].
//!
//! [`reactor::Reactor`]: crate::reactor::Reactor

#![deny(missing_debug_implementations)]

#[macro_use]
mod macros;

mod interest;
pub use interest::Interest;

mod token;
pub use token::Token;

mod poll;
pub use poll::{Poll, Registry};

cfg_io_source! {
    mod io_source;
}

pub mod event;
pub use event::Event;

cfg_os_poll! {
    mod waker;
    pub use waker::Waker;
}

cfg_net! {
    pub mod net;
}

mod sys;

cfg_any_os_ext! {
    #[cfg(unix)]
    pub mod unix {
        //! Unix only extensions.

        pub use crate::sys::unix::SourceFd;

        cfg_net! {
            pub use crate::sys::unix::SocketAddr;
        }
    }
}

pub mod sync;
pub mod queue;
pub mod timer;
pub mod conn;
pub mod reactor;
pub mod pubsub;
pub mod url;

mod error;
pub use error::ReactorError;
