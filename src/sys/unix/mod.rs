//! Unix specific extensions.

/// Helper macro to execute a system call that returns an `io::Result`.
macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        #[allow(unused_unsafe)]
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

/// Helper macro to implement `fmt::Debug` for a type printing which flags
/// are set in a bit field.
macro_rules! debug_detail {
    (
        $type: ident ($event_type: ty), $test: path,
        $($(#[$attr_again: meta])* $flag: path),*$(,)*
    ) => {
        struct $type($event_type);

        impl std::fmt::Debug for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut written_one = false;
                $(
                    $(#[$attr_again])*
                    #[allow(clippy::bad_bit_mask)]
                    if $test(&self.0, &$flag) {
                        if written_one {
                            write!(f, " | ")?;
                        }
                        write!(f, stringify!($flag))?;
                        written_one = true;
                    }
                )*
                if !written_one {
                    write!(f, "(empty)")?;
                }
                Ok(())
            }
        }
    };
}

mod net;
pub(crate) use self::net::{raw_pread, raw_read, raw_sendfile, raw_write};

mod selector;
pub(crate) use self::selector::{event, Event, Events, Selector};
cfg_io_source! {
    pub(crate) use self::selector::IoSourceState;
}

mod sourcefd;
pub(crate) use self::sourcefd::SourceFd;

mod waker;
pub(crate) use self::waker::Waker;

cfg_net! {
    pub(crate) mod tcp;
    pub(crate) mod uds;

    pub(crate) use self::tcp::{TcpListener, TcpStream};
    pub(crate) use self::uds::SocketAddr;
}
