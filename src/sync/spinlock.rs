use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[cfg(debug_assertions)]
use std::panic::Location;
#[cfg(debug_assertions)]
use std::sync::Mutex;

/// A single-byte spinlock guarding a value.
///
/// `lock` spins, yielding the thread with a one-nanosecond sleep on each
/// failed attempt, rather than blocking in the kernel; it is meant for
/// critical sections short enough that a syscall would dominate the cost
/// (socket/protocol pointer swaps, packet-queue splices). Long or
/// potentially-blocking work must never run while a `Spinlock` is held.
pub struct Spinlock<T: ?Sized> {
    locked: AtomicBool,
    #[cfg(debug_assertions)]
    holder: Mutex<Option<&'static Location<'static>>>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub fn new(data: T) -> Spinlock<T> {
        Spinlock {
            locked: AtomicBool::new(false),
            #[cfg(debug_assertions)]
            holder: Mutex::new(None),
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Spinlock<T> {
    /// Acquires the lock, spinning until it is free.
    #[track_caller]
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            thread::sleep(Duration::from_nanos(1));
        }
        #[cfg(debug_assertions)]
        {
            *self.holder.lock().unwrap() = Some(Location::caller());
        }
        SpinlockGuard { lock: self }
    }

    /// Attempts to acquire the lock without spinning.
    #[track_caller]
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            #[cfg(debug_assertions)]
            {
                *self.holder.lock().unwrap() = Some(Location::caller());
            }
            Some(SpinlockGuard { lock: self })
        } else {
            None
        }
    }

    /// Returns the source location that currently holds the lock, if any.
    ///
    /// Diagnostic only; compiled out entirely in release builds.
    #[cfg(debug_assertions)]
    pub fn holder(&self) -> Option<&'static Location<'static>> {
        *self.holder.lock().unwrap()
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Spinlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Spinlock").field("data", &*guard).finish(),
            None => f
                .debug_struct("Spinlock")
                .field("data", &format_args!("<locked>"))
                .finish(),
        }
    }
}

impl<T: Default> Default for Spinlock<T> {
    fn default() -> Spinlock<T> {
        Spinlock::new(T::default())
    }
}

/// RAII guard returned by [`Spinlock::lock`]/[`Spinlock::try_lock`].
pub struct SpinlockGuard<'a, T: ?Sized> {
    lock: &'a Spinlock<T>,
}

impl<T: ?Sized> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            *self.lock.holder.lock().unwrap() = None;
        }
        self.lock.locked.store(false, Ordering::Release);
    }
}
