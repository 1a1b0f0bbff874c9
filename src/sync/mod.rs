//! Concurrency primitives shared by the task queue, timer wheel, connection
//! table and pub/sub fabric: a spinlock, an atomic monotonic counter, an
//! intrusive doubly linked list, and a nanosleep-based thread park/back-off
//! helper.
//!
//! None of these depend on the rest of the crate; everything above this
//! module builds on them.

mod spinlock;
pub use spinlock::{Spinlock, SpinlockGuard};

mod list;
pub use list::{IntrusiveList, Link};

mod parking;
pub use parking::Backoff;

mod counter;
pub use counter::AtomicCounter;
