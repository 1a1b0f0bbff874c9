//! Queued outbound writes ("Packet").

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// One queued write: either an in-memory buffer or a slice of an open file,
/// sent via `sendfile`-style bulk transfer when the default R/W hooks are
/// in use.
pub enum Packet {
    Buffer { data: Vec<u8>, offset: usize },
    File { file: File, offset: u64, remaining: u64 },
}

impl Packet {
    pub fn from_buffer(data: Vec<u8>) -> Packet {
        Packet::Buffer { data, offset: 0 }
    }

    pub fn from_file(file: File, offset: u64, length: u64) -> Packet {
        Packet::File {
            file,
            offset,
            remaining: length,
        }
    }

    /// Whether every byte of this packet has already been written.
    pub fn is_drained(&self) -> bool {
        match self {
            Packet::Buffer { data, offset } => *offset >= data.len(),
            Packet::File { remaining, .. } => *remaining == 0,
        }
    }

    /// Writes as much of the packet as `raw_write` accepts in one call,
    /// advancing the internal cursor. Returns the number of bytes written
    /// in this call.
    ///
    /// `raw_write` is given the remaining bytes for a buffer packet, or
    /// `None` for a file packet (the caller is expected to use its own
    /// `sendfile`/`pread`-and-write strategy via `write_file_chunk`).
    pub fn write_buffer_chunk(&mut self, raw_write: impl FnOnce(&[u8]) -> io::Result<usize>) -> io::Result<usize> {
        match self {
            Packet::Buffer { data, offset } => {
                let n = raw_write(&data[*offset..])?;
                *offset += n;
                Ok(n)
            }
            Packet::File { .. } => panic!("write_buffer_chunk called on a file packet"),
        }
    }

    /// Advances a file packet's cursor by `n` bytes written this call.
    pub fn advance_file(&mut self, n: u64) {
        match self {
            Packet::File { offset, remaining, .. } => {
                *offset += n;
                *remaining = remaining.saturating_sub(n);
            }
            Packet::Buffer { .. } => panic!("advance_file called on a buffer packet"),
        }
    }

    pub fn file_fd(&self) -> Option<RawFd> {
        match self {
            Packet::File { file, .. } => Some(file.as_raw_fd()),
            Packet::Buffer { .. } => None,
        }
    }

    pub fn file_offset(&self) -> Option<u64> {
        match self {
            Packet::File { offset, .. } => Some(*offset),
            Packet::Buffer { .. } => None,
        }
    }

    pub fn file_remaining(&self) -> Option<u64> {
        match self {
            Packet::File { remaining, .. } => Some(*remaining),
            Packet::Buffer { .. } => None,
        }
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Packet::Buffer { data, offset } => f
                .debug_struct("Packet::Buffer")
                .field("len", &data.len())
                .field("offset", &offset)
                .finish(),
            Packet::File { offset, remaining, .. } => f
                .debug_struct("Packet::File")
                .field("offset", &offset)
                .field("remaining", &remaining)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Packet;

    #[test]
    fn buffer_packet_drains_across_partial_writes() {
        let mut packet = Packet::from_buffer(vec![1, 2, 3, 4, 5]);
        assert!(!packet.is_drained());
        let n = packet.write_buffer_chunk(|buf| Ok(buf.len().min(2))).unwrap();
        assert_eq!(n, 2);
        assert!(!packet.is_drained());
        packet.write_buffer_chunk(|buf| Ok(buf.len())).unwrap();
        assert!(packet.is_drained());
    }
}
