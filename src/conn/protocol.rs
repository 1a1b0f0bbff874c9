//! The protocol vtable ("Protocol") and the narrow reactor-facing
//! interface it calls back into.
//!
//! `Protocol` lives in `conn` rather than `reactor` so the connection layer
//! has no upward dependency on the reactor: callbacks are handed a
//! `&dyn ReactorOps` rather than a concrete `Reactor`, and `reactor::Reactor`
//! implements that trait. This mirrors the R/W hook seam (design notes §9)
//! applied one layer up.

use std::io;

use super::uuid::Uuid;

/// Ping outcome used by the timeout walker. Any value other
/// than `Eternal` is read as "still subject to the configured timeout";
/// the exact number carries no meaning beyond that, matching `fio_timeout`
/// treating every non-255 return identically.
pub const PING_ETERNAL: u8 = 255;

/// The subset of reactor operations a [`Protocol`] callback may need.
/// Implemented by [`crate::reactor::Reactor`]; kept as a trait so this
/// module never depends on the reactor crate-graph direction.
pub trait ReactorOps: Send + Sync {
    fn read(&self, uuid: Uuid, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&self, uuid: Uuid, data: Vec<u8>) -> io::Result<()>;
    fn write_urgent(&self, uuid: Uuid, data: Vec<u8>) -> io::Result<()>;
    fn close(&self, uuid: Uuid);
    fn force_close(&self, uuid: Uuid);
    fn touch(&self, uuid: Uuid);
    fn is_valid(&self, uuid: Uuid) -> bool;
}

/// User-supplied connection behavior.
///
/// `on_close` is the universal terminal signal: it is guaranteed to run
/// exactly once per attached connection, after every other callback for
/// that `Uuid`, and is the place to free any protocol-owned state.
pub trait Protocol: Send {
    /// New data is available; read it with `reactor.read`. At most one
    /// `on_data` call is ever in flight per connection (the scheduled-flag
    /// in §4.E1 enforces this); the default does nothing, which — since no
    /// read happens — leaves the socket's readability unacknowledged and
    /// so effectively suspends the connection until a concrete protocol is
    /// attached. This is the "on_data -> suspend" mock of §4.E.1.
    fn on_data(&mut self, reactor: &dyn ReactorOps, uuid: Uuid) {
        let _ = (reactor, uuid);
    }

    /// The connection became writable and had queued packets flushed.
    fn on_ready(&mut self, reactor: &dyn ReactorOps, uuid: Uuid) {
        let _ = (reactor, uuid);
    }

    /// The reactor is shutting down. Returning `1..=254` grants that many
    /// seconds of grace before `force_close`; `0` requests immediate
    /// closure. The default requests immediate closure.
    fn on_shutdown(&mut self, reactor: &dyn ReactorOps, uuid: Uuid) -> u8 {
        let _ = (reactor, uuid);
        0
    }

    /// Fires exactly once, after every other callback for `uuid`. This is
    /// the signal to release any resources `on_data`/`on_ready` allocated.
    fn on_close(&mut self, reactor: &dyn ReactorOps, uuid: Uuid) {
        let _ = (reactor, uuid);
    }

    /// The timeout walker (§4.E.4) found this connection idle past its
    /// configured timeout. Return [`PING_ETERNAL`] to exempt the connection
    /// from further timeout enforcement; any other value leaves it subject
    /// to the next timeout check. The default mock is "ping -> force-close"
    /// verbatim: a protocol with no real heartbeat just gets disconnected
    /// on the first missed timeout instead of being pinged forever.
    fn ping(&mut self, reactor: &dyn ReactorOps, uuid: Uuid) -> u8 {
        reactor.force_close(uuid);
        0
    }
}
