//! Inter-process cluster fabric wire format.
//!
//! Every worker connects to a single master-owned Unix socket at startup;
//! the master rebroadcasts CLUSTER/SIBLINGS-scoped publishes to every other
//! connected worker. This module only defines the frame format and the
//! socket path convention; the non-blocking transport itself is wired up by
//! the reactor module against that same socket's fd like any other
//! connection.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::error::{ReactorError, ReactorResult};

use super::message::Message;

/// Frame kinds exchanged across the cluster socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FrameType {
    ForwardMsg = 0,
    ForwardJson = 1,
    RootOnlyMsg = 2,
    RootOnlyJson = 3,
    Subscribe = 4,
    Unsubscribe = 5,
    PatternSubscribe = 6,
    PatternUnsubscribe = 7,
    Shutdown = 8,
    Error = 9,
    Ping = 10,
}

impl FrameType {
    fn from_u32(v: u32) -> ReactorResult<FrameType> {
        Ok(match v {
            0 => FrameType::ForwardMsg,
            1 => FrameType::ForwardJson,
            2 => FrameType::RootOnlyMsg,
            3 => FrameType::RootOnlyJson,
            4 => FrameType::Subscribe,
            5 => FrameType::Unsubscribe,
            6 => FrameType::PatternSubscribe,
            7 => FrameType::PatternUnsubscribe,
            8 => FrameType::Shutdown,
            9 => FrameType::Error,
            10 => FrameType::Ping,
            other => return Err(ReactorError::ClusterProtocol(format!("unknown frame type {other}"))),
        })
    }
}

/// One frame on the wire: a 16-byte header (`channel_len`, `payload_len`,
/// `frame_type`, `filter`, all big-endian `u32`) followed by the channel
/// bytes, a NUL, the payload bytes, and a trailing NUL.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_type: FrameType,
    pub filter: i32,
    pub channel: Vec<u8>,
    pub payload: Vec<u8>,
}

const HEADER_LEN: usize = 16;

impl Frame {
    pub fn forward(msg: &Message) -> Frame {
        Frame {
            frame_type: if msg.is_json { FrameType::ForwardJson } else { FrameType::ForwardMsg },
            filter: msg.filter,
            channel: msg.channel.clone(),
            payload: msg.payload.clone(),
        }
    }

    /// A `Root`-scoped publish: routed to the master's own subscribers only
    /// and never relayed further once it arrives there (see
    /// `ClusterPeerProtocol::handle_frame`).
    pub fn root_only(msg: &Message) -> Frame {
        Frame {
            frame_type: if msg.is_json { FrameType::RootOnlyJson } else { FrameType::RootOnlyMsg },
            filter: msg.filter,
            channel: msg.channel.clone(),
            payload: msg.payload.clone(),
        }
    }

    pub fn subscribe(channel: Vec<u8>, pattern: bool) -> Frame {
        Frame {
            frame_type: if pattern { FrameType::PatternSubscribe } else { FrameType::Subscribe },
            filter: 0,
            channel,
            payload: Vec::new(),
        }
    }

    pub fn unsubscribe(channel: Vec<u8>, pattern: bool) -> Frame {
        Frame {
            frame_type: if pattern { FrameType::PatternUnsubscribe } else { FrameType::Unsubscribe },
            filter: 0,
            channel,
            payload: Vec::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.channel.len() + self.payload.len() + 2);
        buf.extend_from_slice(&(self.channel.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(self.frame_type as u32).to_be_bytes());
        buf.extend_from_slice(&(self.filter as u32).to_be_bytes());
        buf.extend_from_slice(&self.channel);
        buf.push(0);
        buf.extend_from_slice(&self.payload);
        buf.push(0);
        buf
    }

    /// Decodes one frame from the front of `buf`, returning the frame and
    /// the number of bytes consumed, or `Ok(None)` if `buf` doesn't yet hold
    /// a complete frame.
    pub fn decode(buf: &[u8]) -> ReactorResult<Option<(Frame, usize)>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let channel_len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
        let payload_len = u32::from_be_bytes(buf[4..8].try_into().unwrap()) as usize;
        let frame_type = FrameType::from_u32(u32::from_be_bytes(buf[8..12].try_into().unwrap()))?;
        let filter = u32::from_be_bytes(buf[12..16].try_into().unwrap()) as i32;

        let total = HEADER_LEN + channel_len + 1 + payload_len + 1;
        if buf.len() < total {
            return Ok(None);
        }

        let channel_start = HEADER_LEN;
        let channel_end = channel_start + channel_len;
        if buf[channel_end] != 0 {
            return Err(ReactorError::ClusterProtocol("missing channel terminator".into()));
        }
        let payload_start = channel_end + 1;
        let payload_end = payload_start + payload_len;
        if buf[payload_end] != 0 {
            return Err(ReactorError::ClusterProtocol("missing payload terminator".into()));
        }

        Ok(Some((
            Frame {
                frame_type,
                filter,
                channel: buf[channel_start..channel_end].to_vec(),
                payload: buf[payload_start..payload_end].to_vec(),
            },
            total,
        )))
    }

    pub fn write_blocking<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.encode())
    }

    /// Reads exactly one frame from `reader`, blocking as needed. Used by
    /// tests and by any transport that hasn't been folded into the
    /// non-blocking reactor loop yet.
    pub fn read_blocking<R: Read>(reader: &mut R) -> io::Result<Frame> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;
        let channel_len = u32::from_be_bytes(header[0..4].try_into().unwrap()) as usize;
        let payload_len = u32::from_be_bytes(header[4..8].try_into().unwrap()) as usize;
        let frame_type = FrameType::from_u32(u32::from_be_bytes(header[8..12].try_into().unwrap()))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        let filter = u32::from_be_bytes(header[12..16].try_into().unwrap()) as i32;

        let mut channel = vec![0u8; channel_len];
        reader.read_exact(&mut channel)?;
        let mut nul = [0u8; 1];
        reader.read_exact(&mut nul)?;

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;
        reader.read_exact(&mut nul)?;

        Ok(Frame { frame_type, filter, channel, payload })
    }
}

/// Picks a collision-resistant path for the master's cluster-listener Unix
/// socket, under `$TMPDIR` (or `base`), suffixed with a random hex tag so
/// concurrent reactor instances on the same host never collide (original
/// source seeds this suffix from its RNG at master startup).
pub fn socket_path(base: Option<PathBuf>) -> PathBuf {
    let dir = base.unwrap_or_else(std::env::temp_dir);
    let suffix: u64 = rand::random();
    dir.join(format!("revio-cluster-{suffix:016x}.sock"))
}
