//! The per-descriptor connection record ("Connection Record").

use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Instant;

use rand::Rng;

use super::packet::Packet;
use super::protocol::Protocol;
use super::rwhook::RwHooks;
use crate::sync::Spinlock;

/// Default per-connection idle timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u32 = 300;

/// Socket-lock-guarded state: everything §3 says the socket lock serializes
/// (hooks, the outbound packet queue, the slowloris bookkeeping, peer
/// address).
pub(crate) struct SocketState {
    pub(crate) fd: RawFd,
    pub(crate) hooks: Box<dyn RwHooks>,
    pub(crate) packets: VecDeque<Packet>,
    pub(crate) peer_addr: Vec<u8>,
    pub(crate) attacked: bool,
    /// Queue length observed the last time the head packet was the same
    /// object, paired with bytes written since — the Slowloris guard's
    /// sliding window.
    pub(crate) flush_window_queue_len: usize,
    pub(crate) flush_window_bytes: usize,
    /// Set once the R/W hook's `before_close` has asked to defer the
    /// actual descriptor close (it still has its own data to flush, e.g. a
    /// TLS close-notify alert). While set, `flush_task` drives the hook's
    /// own `flush` instead of the packet queue until it reports drained.
    pub(crate) close_deferred: bool,
}

impl SocketState {
    fn new(fd: RawFd, hooks: Box<dyn RwHooks>, peer_addr: Vec<u8>) -> SocketState {
        SocketState {
            fd,
            hooks,
            packets: VecDeque::new(),
            peer_addr,
            attacked: false,
            flush_window_queue_len: 0,
            flush_window_bytes: 0,
            close_deferred: false,
        }
    }
}

/// One linked destructor, invoked exactly once when the owning connection
/// closes ("uuid-linked objects").
pub(crate) struct LinkedObject {
    pub(crate) id: u64,
    pub(crate) destructor: Box<dyn FnOnce() + Send>,
}

/// One descriptor's worth of reactor state. Indexed by fd in
/// [`super::table::ConnectionTable`].
pub struct Slot {
    pub(crate) generation: AtomicU8,
    pub(crate) open: AtomicBool,
    pub(crate) closing: AtomicBool,
    /// Set while an on-data task for this uuid is queued or running, so at
    /// most one is ever in flight at a time.
    pub(crate) scheduled: AtomicBool,
    pub(crate) timeout_secs: AtomicU32,
    pub(crate) eternal: AtomicBool,
    pub(crate) last_activity: Spinlock<Instant>,
    pub(crate) socket: Spinlock<Option<SocketState>>,
    pub(crate) protocol: Spinlock<Option<Box<dyn Protocol>>>,
    pub(crate) links: Spinlock<Vec<LinkedObject>>,
    next_link_id: AtomicU64,
}

impl Slot {
    pub(crate) fn new(now: Instant) -> Slot {
        let seed: u8 = rand::rng().random();
        Slot {
            generation: AtomicU8::new(seed),
            open: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            timeout_secs: AtomicU32::new(DEFAULT_TIMEOUT_SECS),
            eternal: AtomicBool::new(false),
            last_activity: Spinlock::new(now),
            socket: Spinlock::new(None),
            protocol: Spinlock::new(None),
            links: Spinlock::new(Vec::new()),
            next_link_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn generation(&self) -> u8 {
        self.generation.load(Ordering::Acquire)
    }

    /// Marks the slot open under a fresh generation, installing `hooks` and
    /// `peer_addr`. Returns the new generation so the caller can mint a
    /// [`super::uuid::Uuid`].
    ///
    /// Every open bumps the generation (wrapping), so a `Uuid` minted
    /// against a prior occupant of this fd never validates again, even if
    /// the OS immediately recycles the descriptor number.
    pub(crate) fn open(&self, fd: RawFd, hooks: Box<dyn RwHooks>, peer_addr: Vec<u8>, now: Instant) -> u8 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        *self.socket.lock() = Some(SocketState::new(fd, hooks, peer_addr));
        *self.protocol.lock() = None;
        self.open.store(true, Ordering::Release);
        self.closing.store(false, Ordering::Release);
        self.scheduled.store(false, Ordering::Release);
        self.eternal.store(false, Ordering::Release);
        self.timeout_secs.store(DEFAULT_TIMEOUT_SECS, Ordering::Release);
        *self.last_activity.lock() = now;
        self.links.lock().clear();
        generation
    }

    pub(crate) fn touch(&self, now: Instant) {
        *self.last_activity.lock() = now;
    }

    pub(crate) fn is_idle_past_timeout(&self, now: Instant) -> bool {
        if self.eternal.load(Ordering::Acquire) {
            return false;
        }
        let timeout = self.timeout_secs.load(Ordering::Acquire);
        if timeout == 0 {
            return false;
        }
        let last = *self.last_activity.lock();
        now.duration_since(last).as_secs() >= timeout as u64
    }

    /// Tears the slot down, returning the socket state (so the caller can
    /// run the R/W hook's `cleanup` before actually `close(2)`-ing the fd),
    /// the protocol (to schedule `on_close`), and the linked destructors
    /// (to run). The generation is left untouched until the next `open`,
    /// so stale `Uuid`s keep failing validation in the meantime (there is
    /// no valid generation to collide with: the fd is simply closed and
    /// not yet reopened).
    pub(crate) fn take_for_close(&self) -> (Option<SocketState>, Option<Box<dyn Protocol>>, Vec<LinkedObject>) {
        self.open.store(false, Ordering::Release);
        self.closing.store(false, Ordering::Release);
        self.scheduled.store(false, Ordering::Release);
        let socket = self.socket.lock().take();
        let protocol = self.protocol.lock().take();
        let links = std::mem::take(&mut *self.links.lock());
        (socket, protocol, links)
    }

    pub(crate) fn next_link_id(&self) -> u64 {
        self.next_link_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("open", &self.is_open())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
