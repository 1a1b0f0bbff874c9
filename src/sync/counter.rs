use std::sync::atomic::{AtomicU64, Ordering};

/// A sequentially-consistent monotonic counter.
///
/// Used for the connection table's per-slot generation bits and for the
/// task queue's debug sequence numbering. Wrapping is intentional: a
/// generation counter only needs to differ from its previous value, not to
/// be globally unique.
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    pub const fn new(initial: u64) -> AtomicCounter {
        AtomicCounter(AtomicU64::new(initial))
    }

    /// Returns the current value without modifying it.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Atomically increments the counter and returns the value *before* the
    /// increment.
    pub fn fetch_add(&self, delta: u64) -> u64 {
        self.0.fetch_add(delta, Ordering::SeqCst)
    }

    /// Atomically replaces the value, returning the previous one.
    pub fn swap(&self, value: u64) -> u64 {
        self.0.swap(value, Ordering::SeqCst)
    }
}
