//! A single subscription.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::sync::Spinlock;

use super::message::Message;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub type OnMessage = Arc<dyn Fn(&Subscription, Arc<Message>) + Send + Sync>;

/// A live registration against either an exact channel or a glob pattern.
///
/// `unsubscribe` must not return to the caller while the matching
/// `on_message` callback is still running on another thread (spec: "a
/// subscription may be cancelled from within its own callback, and
/// `unsubscribe` blocks until any concurrently running callback completes").
/// `running` is the lock that provides that guarantee: `dispatch` holds it
/// for the duration of the callback, `cancel` takes and immediately drops it
/// after flipping `cancelled`.
pub struct Subscription {
    id: u64,
    pub channel: Vec<u8>,
    pub filter: i32,
    pub is_pattern: bool,
    callback: OnMessage,
    cancelled: AtomicBool,
    running: Spinlock<()>,
}

impl Subscription {
    pub(super) fn new(channel: Vec<u8>, filter: i32, is_pattern: bool, callback: OnMessage) -> Arc<Subscription> {
        Arc::new(Subscription {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            channel,
            filter,
            is_pattern,
            callback,
            cancelled: AtomicBool::new(false),
            running: Spinlock::new(()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Runs the callback unless the subscription has been cancelled,
    /// holding `running` for the duration so a concurrent `cancel()` blocks.
    pub(super) fn dispatch(self: &Arc<Self>, msg: Arc<Message>) {
        if self.is_cancelled() {
            return;
        }
        let _guard = self.running.lock();
        if self.is_cancelled() {
            return;
        }
        (self.callback)(self, msg);
    }

    /// Marks the subscription cancelled and waits for any in-flight
    /// `dispatch` to finish before returning.
    pub(super) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let _guard = self.running.lock();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &String::from_utf8_lossy(&self.channel))
            .field("filter", &self.filter)
            .field("is_pattern", &self.is_pattern)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_skips_cancelled_subscription() {
        let hits = Arc::new(AtomicU64::new(0));
        let hits2 = Arc::clone(&hits);
        let sub = Subscription::new(
            b"room".to_vec(),
            0,
            false,
            Arc::new(move |_sub, _msg| {
                hits2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let msg = Arc::new(Message::new(0, b"room".to_vec(), b"hi".to_vec()));
        sub.dispatch(Arc::clone(&msg));
        sub.cancel();
        sub.dispatch(msg);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
