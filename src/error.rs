//! Error taxonomy for the engine.
//!
//! Mirrors the disposition table of the design: a per-connection error never
//! brings down a worker, it only closes the connection it happened on.

use std::io;

/// Everything that can go wrong while driving an `io_uring` completion.
#[derive(Debug, thiserror::Error)]
pub enum IoEngineError {
    /// No free slot in the kernel submission queue. Transient: the caller
    /// should treat it as back-pressure and retry after the next completion.
    #[error("submission queue is full")]
    SubmitQueueFull,

    /// The completion indicated a reset or otherwise-dead peer, or a
    /// zero-byte read was observed at callback time.
    #[error("peer closed the connection")]
    PeerClosed,

    /// Any other kernel failure; carries the originating `errno`.
    #[error("internal I/O error: {0}")]
    Internal(#[from] io::Error),

    /// A worker thread panicked inside a user callback and could not
    /// continue servicing its connections.
    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
}

/// Result alias used throughout the engine's fallible APIs.
pub type IoResult<T> = Result<T, IoEngineError>;

impl IoEngineError {
    /// True for errors that should close the connection but leave the
    /// worker and the rest of the server running.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            IoEngineError::SubmitQueueFull | IoEngineError::PeerClosed | IoEngineError::Internal(_)
        )
    }
}
