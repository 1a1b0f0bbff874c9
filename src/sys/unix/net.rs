use std::io;
use std::mem::size_of;
use std::net::SocketAddr;
use std::os::unix::io::{FromRawFd, RawFd};

/// Create a new non-blocking, close-on-exec socket for the address family of
/// `addr` (`AF_INET`/`AF_INET6`).
pub(crate) fn new_ip_socket(addr: SocketAddr, socket_type: libc::c_int) -> io::Result<RawFd> {
    let domain = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    new_socket(domain, socket_type)
}

/// Create a new non-blocking, close-on-exec socket.
pub(crate) fn new_socket(domain: libc::c_int, socket_type: libc::c_int) -> io::Result<RawFd> {
    #[cfg(not(any(target_os = "ios", target_os = "macos", target_os = "tvos", target_os = "watchos")))]
    let socket_type = socket_type | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;

    let socket = syscall!(socket(domain, socket_type, 0))?;

    #[cfg(any(target_os = "ios", target_os = "macos", target_os = "tvos", target_os = "watchos"))]
    {
        syscall!(fcntl(socket, libc::F_SETFL, libc::O_NONBLOCK))?;
        syscall!(fcntl(socket, libc::F_SETFD, libc::FD_CLOEXEC))?;
    }

    Ok(socket)
}

/// Convert a `SocketAddr` into the raw `sockaddr`/length pair the connect(2)
/// and bind(2) family of syscalls expect.
pub(crate) fn socket_addr(addr: &SocketAddr) -> (*const libc::sockaddr, libc::socklen_t) {
    match addr {
        SocketAddr::V4(ref addr) => (
            addr as *const _ as *const libc::sockaddr,
            size_of::<libc::sockaddr_in>() as libc::socklen_t,
        ),
        SocketAddr::V6(ref addr) => (
            addr as *const _ as *const libc::sockaddr,
            size_of::<libc::sockaddr_in6>() as libc::socklen_t,
        ),
    }
}

/// # Safety
/// `storage` must have been initialised as a `sockaddr_in` or `sockaddr_in6`.
pub(crate) unsafe fn to_socket_addr(
    storage: *const libc::sockaddr_storage,
) -> io::Result<SocketAddr> {
    match (*storage).ss_family as libc::c_int {
        libc::AF_INET => Ok(SocketAddr::V4(
            *(storage as *const libc::sockaddr_in as *const _),
        )),
        libc::AF_INET6 => Ok(SocketAddr::V6(
            *(storage as *const libc::sockaddr_in6 as *const _),
        )),
        _ => Err(io::ErrorKind::InvalidInput.into()),
    }
}

pub(crate) fn from_raw_fd_checked<T: FromRawFd>(fd: RawFd) -> T {
    unsafe { T::from_raw_fd(fd) }
}

/// Direct `read(2)` on a raw descriptor, for the connection layer's default
/// R/W hook. Used instead of going through `std::net`'s owned
/// socket types, since the connection table stores bare fds.
pub(crate) fn raw_read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = syscall!(read(
        fd,
        buf.as_mut_ptr() as *mut libc::c_void,
        buf.len()
    ))?;
    Ok(n as usize)
}

/// Direct `write(2)` on a raw descriptor.
pub(crate) fn raw_write(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let n = syscall!(write(
        fd,
        buf.as_ptr() as *const libc::c_void,
        buf.len()
    ))?;
    Ok(n as usize)
}

/// `pread(2)`: reads from `fd` at `offset` without moving its file cursor.
/// Backs the connection layer's file-packet writer when the default hooks
/// are active and `sendfile` is unavailable/unsupported for the transport.
pub(crate) fn raw_pread(fd: RawFd, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let n = syscall!(pread(
        fd,
        buf.as_mut_ptr() as *mut libc::c_void,
        buf.len(),
        offset as libc::off_t
    ))?;
    Ok(n as usize)
}

/// `sendfile(2)` zero-copy transfer from `in_fd` to `out_fd`, bounded to
/// `count` bytes per call (the original bounds each call rather than
/// transferring a whole file at once, to cap one flush's latency impact on
/// other connections sharing the same worker thread).
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn raw_sendfile(out_fd: RawFd, in_fd: RawFd, offset: u64, count: usize) -> io::Result<usize> {
    let mut off = offset as libc::off_t;
    let n = syscall!(sendfile(out_fd, in_fd, &mut off, count))?;
    Ok(n as usize)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) fn raw_sendfile(_out_fd: RawFd, _in_fd: RawFd, _offset: u64, _count: usize) -> io::Result<usize> {
    Err(io::ErrorKind::Unsupported.into())
}
