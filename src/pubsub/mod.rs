//! Publish/subscribe fabric.
//!
//! [`PostOffice`] is the process-local facade: exact/pattern/filter
//! subscription bookkeeping plus four publish scopes. `Process` never
//! leaves this reactor instance, `Siblings` skips the
//! publishing process, `Cluster` includes it, and `Root` routes only to the
//! root (master) process. Cross-process delivery for the latter three rides
//! the wire format in [`cluster`] over a connection the reactor module
//! attaches like any other socket; `PostOffice` itself knows nothing about
//! fork/sockets, matching the dependency-inversion shape used between
//! `conn` and `reactor`.

mod channel;
mod cluster;
mod glob;
mod message;
mod subscription;

pub use channel::ChannelRegistry;
pub use cluster::{socket_path, Frame, FrameType};
pub use message::Message;
pub use subscription::{OnMessage, Subscription};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which processes a published message should reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishScope {
    /// This process only; never put on the cluster wire.
    Process,
    /// Every other process in the cluster, but not this one.
    Siblings,
    /// Every process in the cluster, this one included.
    Cluster,
    /// The root (master) process only.
    Root,
}

/// A callback invoked for every outbound `Cluster`/`Siblings`/`Root`-scoped
/// publish, so the reactor module can forward it onto the cluster socket.
/// `PostOffice` has no socket of its own; it only ever calls this hook.
pub type ClusterForward = Arc<dyn Fn(PublishScope, &Message) + Send + Sync>;

/// A publisher-installed global metadata callback (spec §4.G "Metadata"):
/// runs once per message, at publish time, within the publishing process
/// only, and attaches typed auxiliary data via [`Message::set_metadata`]
/// before the message reaches any subscriber.
pub type MetadataCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// The process-local pub/sub facade.
pub struct PostOffice {
    registry: ChannelRegistry,
    forward: crate::sync::Spinlock<Option<ClusterForward>>,
    metadata_callback: crate::sync::Spinlock<Option<MetadataCallback>>,
    /// Whether this process is the cluster root. `Root`-scoped publishes
    /// only dispatch to local subscribers when this is set; otherwise they
    /// are forwarded to the master over the cluster wire and never
    /// delivered locally by the publishing (non-root) process itself.
    is_master: AtomicBool,
}

impl Default for PostOffice {
    fn default() -> PostOffice {
        PostOffice::new()
    }
}

impl PostOffice {
    pub fn new() -> PostOffice {
        PostOffice {
            registry: ChannelRegistry::new(),
            forward: crate::sync::Spinlock::new(None),
            metadata_callback: crate::sync::Spinlock::new(None),
            is_master: AtomicBool::new(false),
        }
    }

    /// Installs the hook used to forward `Cluster`/`Siblings`/`Root`-scoped
    /// publishes onto the cluster wire. The reactor module calls this once,
    /// after it has attached the cluster socket.
    pub fn set_cluster_forward(&self, forward: ClusterForward) {
        *self.forward.lock() = Some(forward);
    }

    /// Installs (or replaces) the global metadata callback `publish` runs
    /// once per message (`message_metadata`, spec §6/§4.G). Only one
    /// callback is ever live; a second call replaces the first.
    pub fn set_message_metadata(&self, callback: MetadataCallback) {
        *self.metadata_callback.lock() = Some(callback);
    }

    /// Marks this `PostOffice` as belonging to the cluster root process.
    /// Called by the reactor module when it takes on the master role
    /// (including single-worker mode, where the sole process is its own
    /// root).
    pub fn set_is_master(&self, is_master: bool) {
        self.is_master.store(is_master, Ordering::Release);
    }

    pub fn is_master(&self) -> bool {
        self.is_master.load(Ordering::Acquire)
    }

    pub fn subscribe(&self, channel: impl Into<Vec<u8>>, callback: OnMessage) -> Arc<Subscription> {
        self.registry.subscribe(channel.into(), callback)
    }

    pub fn subscribe_pattern(&self, pattern: impl Into<Vec<u8>>, callback: OnMessage) -> Arc<Subscription> {
        self.registry.subscribe_pattern(pattern.into(), callback)
    }

    pub fn subscribe_filter(&self, filter: i32, callback: OnMessage) -> Arc<Subscription> {
        self.registry.subscribe_filter(filter, callback)
    }

    pub fn unsubscribe(&self, subscription: &Arc<Subscription>) {
        self.registry.unsubscribe(subscription);
    }

    /// Publishes `msg` with the given scope. A non-zero `msg.filter` is
    /// always process-local regardless of `scope` — filter-keyed messages
    /// are delivered only to exact-filter matches within the calling
    /// process and the cluster-forward hook is never invoked for them.
    /// Otherwise: `Process`-scoped messages only ever dispatch locally;
    /// `Cluster` dispatches locally in addition to forwarding, so the
    /// publisher also observes its own message; `Siblings` never dispatches
    /// locally; `Root` dispatches locally only when this process is itself
    /// the cluster root — a worker publishing `Root` forwards to the master
    /// and relies on the master's own `PostOffice` (with `is_master` set)
    /// to deliver to the master's subscribers.
    pub fn publish(&self, scope: PublishScope, msg: Message) {
        if let Some(callback) = self.metadata_callback.lock().as_ref() {
            callback(&msg);
        }
        if msg.filter != 0 {
            self.registry.publish(Arc::new(msg));
            return;
        }
        let msg = Arc::new(msg);
        let deliver_locally = match scope {
            PublishScope::Process | PublishScope::Cluster => true,
            PublishScope::Siblings => false,
            PublishScope::Root => self.is_master(),
        };
        if deliver_locally {
            self.registry.publish(Arc::clone(&msg));
        }
        if scope != PublishScope::Process {
            if let Some(forward) = self.forward.lock().as_ref() {
                forward(scope, &msg);
            }
        }
    }

    /// Delivers a frame received from the cluster socket to local
    /// subscribers only (never re-forwarded — that's the reactor's job when
    /// acting as the rebroadcasting root).
    pub fn deliver_local(&self, msg: Message) {
        self.registry.publish(Arc::new(msg));
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }
}
