//! The connection table: one [`Slot`] per possible descriptor,
//! sized once at startup.

use std::os::unix::io::RawFd;
use std::time::Instant;

use super::record::Slot;
use super::rwhook::RwHooks;
use super::uuid::Uuid;

/// Hard ceiling on table size regardless of `RLIMIT_NOFILE`, matching the
/// original's `FIO_MAX_SOCK_CAPACITY`.
pub const MAX_CAPACITY: usize = 131_072;

/// Fallback capacity when the process's open-file limit cannot be queried.
pub const DEFAULT_CAPACITY: usize = 1024;

/// An array of per-descriptor [`Slot`]s, indexed by fd.
pub struct ConnectionTable {
    slots: Vec<Slot>,
}

impl ConnectionTable {
    /// Builds a table with `capacity` slots (capped at [`MAX_CAPACITY`]).
    pub fn with_capacity(capacity: usize, now: Instant) -> ConnectionTable {
        let capacity = capacity.min(MAX_CAPACITY).max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::new(now));
        ConnectionTable { slots }
    }

    /// Builds a table sized to the process's current `RLIMIT_NOFILE`,
    /// falling back to [`DEFAULT_CAPACITY`] if it cannot be read.
    pub fn from_rlimit(now: Instant) -> ConnectionTable {
        let capacity = current_nofile_limit().unwrap_or(DEFAULT_CAPACITY);
        ConnectionTable::with_capacity(capacity, now)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, fd: RawFd) -> Option<&Slot> {
        self.slots.get(fd as usize)
    }

    /// Validates `uuid`: its fd must be in range and its generation must
    /// match the slot's current generation.
    pub fn validate(&self, uuid: Uuid) -> bool {
        match self.slot(uuid.fd() as RawFd) {
            Some(slot) => slot.is_open() && slot.generation() == uuid.generation(),
            None => false,
        }
    }

    pub(crate) fn slot_for(&self, uuid: Uuid) -> Option<&Slot> {
        let slot = self.slot(uuid.fd() as RawFd)?;
        (slot.generation() == uuid.generation()).then_some(slot)
    }

    /// Raw access by fd, without uuid/generation validation; used right
    /// after `open`/`accept` before a `Uuid` has even been handed back to
    /// the caller, and by the poller which only ever sees bare fds.
    pub(crate) fn slot_by_fd(&self, fd: RawFd) -> Option<&Slot> {
        self.slot(fd)
    }

    /// Reconstructs the current `Uuid` for an open fd, or `None` if it's
    /// closed. Used by the timeout walker and shutdown-drain loop, which
    /// only ever see bare fds via `open_fds`.
    pub(crate) fn uuid_for_fd(&self, fd: RawFd) -> Option<Uuid> {
        let slot = self.slot(fd)?;
        slot.is_open().then(|| Uuid::new(fd as usize, slot.generation()))
    }

    /// Opens the slot at `fd` under a fresh generation and returns the
    /// minted `Uuid`.
    pub fn open(&self, fd: RawFd, hooks: Box<dyn RwHooks>, peer_addr: Vec<u8>, now: Instant) -> Option<Uuid> {
        let slot = self.slot(fd)?;
        let generation = slot.open(fd, hooks, peer_addr, now);
        Some(Uuid::new(fd as usize, generation))
    }

    /// Iterates every currently-open slot's fd, for the timeout walker and
    /// shutdown-drain loop.
    pub(crate) fn open_fds(&self) -> impl Iterator<Item = RawFd> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_open())
            .map(|(fd, _)| fd as RawFd)
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_open()).count()
    }

    /// Registers `destructor` to run exactly once when `uuid` closes.
    /// Returns a link id usable with [`ConnectionTable::unlink`], or `None`
    /// if `uuid` is already invalid.
    pub fn link(&self, uuid: Uuid, destructor: Box<dyn FnOnce() + Send>) -> Option<u64> {
        let slot = self.slot_for(uuid)?;
        let id = slot.next_link_id();
        slot.links.lock().push(super::record::LinkedObject { id, destructor });
        Some(id)
    }

    /// Removes a previously registered link without running its destructor.
    pub fn unlink(&self, uuid: Uuid, id: u64) -> bool {
        let Some(slot) = self.slot_for(uuid) else {
            return false;
        };
        let mut links = slot.links.lock();
        match links.iter().position(|l| l.id == id) {
            Some(pos) => {
                links.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ConnectionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTable")
            .field("capacity", &self.capacity())
            .field("open", &self.open_count())
            .finish()
    }
}

#[cfg(unix)]
fn current_nofile_limit() -> Option<usize> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let res = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if res != 0 {
        return None;
    }
    // Raise the soft limit to the hard limit (or the implementation cap,
    // whichever is lower) so the table isn't needlessly starved by a low
    // default soft limit.
    let target = (limit.rlim_max as usize).min(MAX_CAPACITY as u64 as usize);
    let raised = libc::rlimit {
        rlim_cur: target as libc::rlim_t,
        rlim_max: limit.rlim_max,
    };
    unsafe {
        let _ = libc::setrlimit(libc::RLIMIT_NOFILE, &raised);
    }
    Some(target.max(1))
}
