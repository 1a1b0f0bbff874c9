//! The connection layer: generation-tagged connection handles,
//! the per-descriptor record, the outbound packet queue, the pluggable R/W
//! hook contract, and the protocol vtable.
//!
//! This module owns data structures only; the operational verbs (`read`,
//! `write2`, `flush`, `close`, `attach`, the timeout walker) live on
//! [`crate::reactor::Reactor`], which composes a [`table::ConnectionTable`]
//! with the task queue, timer wheel and poller. Keeping `conn` free of that
//! orchestration is what lets [`protocol::Protocol`] depend only on the
//! narrow [`protocol::ReactorOps`] trait instead of the whole reactor.

mod uuid;
pub use uuid::Uuid;

mod packet;
pub use packet::Packet;

mod rwhook;
pub use rwhook::{DefaultHooks, RwHooks};

mod protocol;
pub use protocol::{Protocol, ReactorOps, PING_ETERNAL};

pub(crate) mod record;
pub use record::DEFAULT_TIMEOUT_SECS;

mod table;
pub use table::{ConnectionTable, DEFAULT_CAPACITY, MAX_CAPACITY};
