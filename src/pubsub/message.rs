//! The pub/sub message ("Message").

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::sync::Spinlock;

/// One published message.
///
/// `filter` non-zero restricts delivery to exact-filter subscribers in the
/// *publishing process only*; `filter == 0` is an ordinary
/// channel-routed message that may also cross process boundaries.
pub struct Message {
    pub filter: i32,
    pub channel: Vec<u8>,
    pub payload: Vec<u8>,
    pub is_json: bool,
    pub msg_type: u32,
    metadata: Spinlock<Vec<(TypeId, Arc<dyn Any + Send + Sync>)>>,
}

impl Message {
    pub fn new(filter: i32, channel: Vec<u8>, payload: Vec<u8>) -> Message {
        Message {
            filter,
            channel,
            payload,
            is_json: false,
            msg_type: 0,
            metadata: Spinlock::new(Vec::new()),
        }
    }

    pub fn json(channel: Vec<u8>, payload: Vec<u8>) -> Message {
        let mut msg = Message::new(0, channel, payload);
        msg.is_json = true;
        msg
    }

    /// Attaches typed auxiliary data, discoverable by subscribers via
    /// [`Message::metadata`]. Installed by a publisher's global metadata
    /// callback at publish time, within the publishing process only (spec
    /// §4.G "Metadata") — e.g. a pre-encoded WebSocket frame so every
    /// subscriber's on_message can skip re-framing the payload.
    pub fn set_metadata<T: Any + Send + Sync + 'static>(&self, value: T) {
        let entry = (TypeId::of::<T>(), Arc::new(value) as Arc<dyn Any + Send + Sync>);
        let mut meta = self.metadata.lock();
        meta.retain(|(id, _)| *id != entry.0);
        meta.push(entry);
    }

    /// Looks up previously attached metadata by type.
    pub fn metadata<T: Any + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let meta = self.metadata.lock();
        meta.iter()
            .find(|(id, _)| *id == TypeId::of::<T>())
            .and_then(|(_, value)| Arc::clone(value).downcast::<T>().ok())
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("filter", &self.filter)
            .field("channel", &String::from_utf8_lossy(&self.channel))
            .field("payload_len", &self.payload.len())
            .field("is_json", &self.is_json)
            .field("msg_type", &self.msg_type)
            .finish()
    }
}
