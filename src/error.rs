//! Error types for the reactor/lifecycle/pub-sub boundary.
//!
//! The poller and connection layers report failures as plain
//! `std::io::Result`, the same as `Poll::poll` itself returns
//! `io::Result<()>`. `ReactorError` sits one layer up, where failures are
//! not "retry or not" but describe richer startup/shutdown/transport
//! conditions.

use std::io;

use thiserror::Error;

/// Errors surfaced by the reactor lifecycle, worker supervision, and the
/// pub/sub cluster transport.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// A wrapped I/O failure bubbled up from the poller or a connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `fork(2)` failed while the root process was spawning a worker.
    #[error("failed to fork worker process: {0}")]
    Fork(#[source] io::Error),

    /// A cluster peer sent a frame that could not be decoded.
    #[error("malformed cluster wire frame: {0}")]
    ClusterProtocol(String),

    /// The connection table has no free slots left.
    #[error("connection table exhausted (limit {limit})")]
    CapacityExceeded { limit: usize },
}

/// Convenience alias for fallible reactor-layer operations.
pub type ReactorResult<T> = Result<T, ReactorError>;
