//! Networking primitives used by the connection layer.
//!
//! The types provided in this module are non-blocking by default. They are
//! the fd-owning building blocks the connection table registers with
//! [`Poll`]; the reactor itself never touches a socket that isn't wrapped in
//! one of these.
//!
//! [`Poll`]: crate::Poll

cfg_net! {
    mod tcp;
    pub use self::tcp::{TcpListener, TcpStream};

    #[cfg(unix)]
    mod uds;
    #[cfg(unix)]
    pub use self::uds::{SocketAddr as UnixSocketAddr, UnixDatagram, UnixListener, UnixStream};
}
