use std::fmt;
use std::num::NonZeroU8;

const READABLE: u8 = 0b0001;
const WRITABLE: u8 = 0b0010;
// The following are not available for all platforms, thus we use `cfg` to
// enable/disable the methods.
const AIO: u8 = 0b0100;
const LIO: u8 = 0b1000;
const PRIORITY: u8 = 0b1_0000;

/// Interest used in registering.
///
/// Interest values can be combined together to register interest in more
/// than one readiness operation, using the `BitOr` operation (`|`).
///
/// For concrete examples see [`Poll`].
///
/// # Implementation notes
///
/// `Interest` uses a bit field internally on all platforms except for
/// windows. On unix platforms (except Solaris) `aio` and `lio` are no-ops, as
/// this is not supported. On Windows `priority` is a no-op, as this is not
/// supported.
///
/// [`Poll`]: crate::Poll
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Interest(NonZeroU8);

impl Interest {
    /// Returns a `Interest` set representing readable readiness.
    pub const READABLE: Interest = Interest(match NonZeroU8::new(READABLE) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Returns a `Interest` set representing writable readiness.
    pub const WRITABLE: Interest = Interest(match NonZeroU8::new(WRITABLE) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Returns a `Interest` set representing AIO completion readiness.
    // Skip on unsupported platforms, but keep available in docs.
    pub const AIO: Interest = Interest(match NonZeroU8::new(AIO) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Returns a `Interest` set representing LIO completion readiness.
    pub const LIO: Interest = Interest(match NonZeroU8::new(LIO) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Returns a `Interest` set representing priority completion readiness.
    pub const PRIORITY: Interest = Interest(match NonZeroU8::new(PRIORITY) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Add together two `Interest`, in effect creating a set representing
    /// interest in all the operations of `self` and `other`.
    pub const fn add(self, other: Interest) -> Interest {
        Interest(unsafe { NonZeroU8::new_unchecked(self.0.get() | other.0.get()) })
    }

    /// Removes `other` `Interest` from `self`.
    ///
    /// Returns `None` if the set would be empty after removing `other`.
    pub fn remove(self, other: Interest) -> Option<Interest> {
        NonZeroU8::new(self.0.get() & !other.0.get()).map(Interest)
    }

    /// Returns true if the value includes readable readiness.
    pub const fn is_readable(self) -> bool {
        (self.0.get() & READABLE) != 0
    }

    /// Returns true if the value includes writable readiness.
    pub const fn is_writable(self) -> bool {
        (self.0.get() & WRITABLE) != 0
    }

    /// Returns true if `Interest` contains AIO readiness.
    pub const fn is_aio(self) -> bool {
        (self.0.get() & AIO) != 0
    }

    /// Returns true if `Interest` contains LIO readiness.
    pub const fn is_lio(self) -> bool {
        (self.0.get() & LIO) != 0
    }

    /// Returns true if `Interest` contains priority readiness.
    pub const fn is_priority(self) -> bool {
        (self.0.get() & PRIORITY) != 0
    }
}

impl std::ops::BitOr for Interest {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        self.add(other)
    }
}

impl std::ops::BitOrAssign for Interest {
    fn bitor_assign(&mut self, other: Self) {
        self.0 = (*self | other).0;
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut one = false;
        if self.is_readable() {
            if one {
                write!(fmt, " | ")?
            }
            write!(fmt, "READABLE")?;
            one = true
        }
        if self.is_writable() {
            if one {
                write!(fmt, " | ")?
            }
            write!(fmt, "WRITABLE")?;
            one = true
        }
        if self.is_aio() {
            if one {
                write!(fmt, " | ")?
            }
            write!(fmt, "AIO")?;
            one = true
        }
        if self.is_lio() {
            if one {
                write!(fmt, " | ")?
            }
            write!(fmt, "LIO")?;
            one = true
        }
        if self.is_priority() {
            if one {
                write!(fmt, " | ")?
            }
            write!(fmt, "PRIORITY")?;
            one = true
        }
        debug_assert!(one, "printing empty interest");
        Ok(())
    }
}
