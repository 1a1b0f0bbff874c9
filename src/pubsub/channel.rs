//! Channel/filter/pattern subscription bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use crate::sync::Spinlock;

use super::glob::glob_match;
use super::message::Message;
use super::subscription::{OnMessage, Subscription};

#[derive(Default)]
struct Registry {
    exact: HashMap<Vec<u8>, Vec<Arc<Subscription>>>,
    pattern: Vec<Arc<Subscription>>,
    filtered: HashMap<i32, Vec<Arc<Subscription>>>,
}

/// The process-local table of subscriptions, keyed three ways: exact channel
/// name, glob pattern, and numeric filter. A single publish looks each
/// collection up and dispatches to whatever matches (a message may satisfy
/// more than one collection at once).
#[derive(Default)]
pub struct ChannelRegistry {
    inner: Spinlock<Registry>,
}

impl ChannelRegistry {
    pub fn new() -> ChannelRegistry {
        ChannelRegistry::default()
    }

    pub fn subscribe(&self, channel: Vec<u8>, callback: OnMessage) -> Arc<Subscription> {
        let sub = Subscription::new(channel.clone(), 0, false, callback);
        self.inner.lock().exact.entry(channel).or_default().push(Arc::clone(&sub));
        sub
    }

    pub fn subscribe_pattern(&self, pattern: Vec<u8>, callback: OnMessage) -> Arc<Subscription> {
        let sub = Subscription::new(pattern, 0, true, callback);
        self.inner.lock().pattern.push(Arc::clone(&sub));
        sub
    }

    pub fn subscribe_filter(&self, filter: i32, callback: OnMessage) -> Arc<Subscription> {
        let sub = Subscription::new(Vec::new(), filter, false, callback);
        self.inner.lock().filtered.entry(filter).or_default().push(Arc::clone(&sub));
        sub
    }

    /// Removes `sub` from whichever collection it lives in and cancels it.
    /// Safe to call from within the subscription's own callback.
    pub fn unsubscribe(&self, sub: &Arc<Subscription>) {
        let mut inner = self.inner.lock();
        if sub.is_pattern {
            inner.pattern.retain(|s| !Arc::ptr_eq(s, sub));
        } else if sub.filter != 0 {
            if let Some(list) = inner.filtered.get_mut(&sub.filter) {
                list.retain(|s| !Arc::ptr_eq(s, sub));
            }
        } else if let Some(list) = inner.exact.get_mut(&sub.channel) {
            list.retain(|s| !Arc::ptr_eq(s, sub));
        }
        drop(inner);
        sub.cancel();
    }

    /// Collects every subscription a message matches, without dispatching.
    /// Taken as a snapshot under lock so callbacks (which may subscribe or
    /// unsubscribe) never run with the registry lock held.
    pub fn matching(&self, msg: &Message) -> Vec<Arc<Subscription>> {
        let inner = self.inner.lock();
        let mut matches = Vec::new();
        if msg.filter != 0 {
            if let Some(list) = inner.filtered.get(&msg.filter) {
                matches.extend(list.iter().filter(|s| !s.is_cancelled()).cloned());
            }
            return matches;
        }
        if let Some(list) = inner.exact.get(&msg.channel) {
            matches.extend(list.iter().filter(|s| !s.is_cancelled()).cloned());
        }
        for sub in inner.pattern.iter().filter(|s| !s.is_cancelled()) {
            if glob_match(&sub.channel, &msg.channel) {
                matches.push(Arc::clone(sub));
            }
        }
        matches
    }

    pub fn publish(&self, msg: Arc<Message>) {
        for sub in self.matching(&msg) {
            sub.dispatch(Arc::clone(&msg));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.lock();
        let exact: usize = inner.exact.values().map(Vec::len).sum();
        let filtered: usize = inner.filtered.values().map(Vec::len).sum();
        exact + inner.pattern.len() + filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn exact_and_pattern_both_receive_matching_message() {
        let registry = ChannelRegistry::new();
        let exact_hits = Arc::new(AtomicUsize::new(0));
        let pattern_hits = Arc::new(AtomicUsize::new(0));

        let e = Arc::clone(&exact_hits);
        registry.subscribe(b"chat.room1".to_vec(), Arc::new(move |_, _| { e.fetch_add(1, Ordering::SeqCst); }));
        let p = Arc::clone(&pattern_hits);
        registry.subscribe_pattern(b"chat.*".to_vec(), Arc::new(move |_, _| { p.fetch_add(1, Ordering::SeqCst); }));

        registry.publish(Arc::new(Message::new(0, b"chat.room1".to_vec(), b"hi".to_vec())));
        assert_eq!(exact_hits.load(Ordering::SeqCst), 1);
        assert_eq!(pattern_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn filtered_message_bypasses_channel_collections() {
        let registry = ChannelRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        registry.subscribe_filter(7, Arc::new(move |_, _| { h.fetch_add(1, Ordering::SeqCst); }));
        registry.subscribe(b"chat.room1".to_vec(), Arc::new(|_, _| panic!("must not fire")));

        let mut msg = Message::new(7, b"chat.room1".to_vec(), b"hi".to_vec());
        msg.filter = 7;
        registry.publish(Arc::new(msg));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_from_matching() {
        let registry = ChannelRegistry::new();
        let sub = registry.subscribe(b"chat".to_vec(), Arc::new(|_, _| {}));
        assert_eq!(registry.subscriber_count(), 1);
        registry.unsubscribe(&sub);
        assert_eq!(registry.subscriber_count(), 0);
        assert!(sub.is_cancelled());
    }
}
