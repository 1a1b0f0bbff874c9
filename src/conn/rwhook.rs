//! The pluggable R/W hook contract ("R/W hook contract").
//!
//! A hook owns transport-layer buffering (TLS being the canonical example);
//! the reactor's packet queue sits on top of it. [`DefaultHooks`] is the
//! identity hook: plain `read(2)`/`write(2)` on the raw descriptor.

use std::io;
use std::os::unix::io::RawFd;

/// Five-slot transport vtable installed per connection.
///
/// Every method takes the raw descriptor directly rather than a `Uuid`:
/// hooks operate below the connection-table layer and must not need to
/// re-enter it.
pub trait RwHooks: Send {
    /// Reads into `buf`, returning bytes read (`Ok(0)` is EOF, matching
    /// `read(2)`). Errors propagate `io::ErrorKind` as documented in §7.
    fn read(&mut self, fd: RawFd, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes `buf`, returning bytes written.
    fn write(&mut self, fd: RawFd, buf: &[u8]) -> io::Result<usize>;

    /// Flushes any hook-internal buffering (e.g. a pending TLS record).
    /// Returns `Ok(true)` while data remains buffered inside the hook,
    /// `Ok(false)` once fully drained.
    fn flush(&mut self, _fd: RawFd) -> io::Result<bool> {
        Ok(false)
    }

    /// Called before the descriptor is actually closed. Returning `Ok(true)`
    /// defers the close until a subsequent `flush` returns `Ok(false)`,
    /// giving e.g. a TLS hook a chance to send a shutdown alert.
    fn before_close(&mut self, _fd: RawFd) -> io::Result<bool> {
        Ok(false)
    }

    /// Called once the descriptor has actually been closed, to release any
    /// hook-owned resources (TLS session state, etc).
    fn cleanup(&mut self, _fd: RawFd) {}
}

/// The default hook: direct, unbuffered `read`/`write` syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl RwHooks for DefaultHooks {
    fn read(&mut self, fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
        crate::sys::raw_read(fd, buf)
    }

    fn write(&mut self, fd: RawFd, buf: &[u8]) -> io::Result<usize> {
        crate::sys::raw_write(fd, buf)
    }
}
