use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::buf::ChainBuffer;
use crate::error::{IoEngineError, IoResult};

/// A slab key identifying a [`Connection`] within the `IoService` (worker)
/// that owns it. Stable for the connection's whole life on that worker;
/// carried as the kernel `user_data` payload for every submission touching
/// this connection (see [`crate::io::event::Submission`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub(crate) usize);

impl ConnId {
    pub(crate) fn slab_key(self) -> usize {
        self.0
    }

    pub(crate) fn from_slab_key(key: usize) -> Self {
        Self(key)
    }
}

/// A globally unique identity for a connection, assigned once at accept
/// time and independent of whichever worker ends up owning it (and
/// whichever slot that worker's slab later assigns).
///
/// A [`ConnId`] is only meaningful on the worker thread that allocated it;
/// cross-thread consumers (the idle timer ticking on the main thread, a
/// `close()` requested from outside the owning worker) need a handle that
/// survives the handover from `TcpServer` to a worker. `ConnToken` is that
/// handle's identity half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnToken(u64);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl ConnToken {
    fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which half of the read -> callback -> write cycle a connection is
/// currently suspended on. Replaces the source's coroutine suspension
/// points with an explicit two-state enum driven by the worker's dispatch
/// loop (see `IoService::run_once`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    AwaitingRead,
    AwaitingWrite,
}

/// An accepted socket paired with its input/output [`ChainBuffer`]s.
///
/// Owned by exactly one worker's connection slab from the moment it's
/// registered until the worker observes the matching close completion.
pub struct Connection {
    fd: RawFd,
    fd_owned: bool,
    token: ConnToken,
    input: ChainBuffer,
    output: ChainBuffer,
    stage: PipelineStage,
    closing: bool,
    close_submitted: bool,
}

impl Connection {
    /// Wraps a freshly accepted descriptor. Called only from
    /// `EventQueue::wait`'s `ACCEPT` handling.
    pub(crate) fn from_accepted(fd: RawFd, chunk_len: usize) -> Self {
        Self {
            fd,
            fd_owned: true,
            token: ConnToken::next(),
            input: ChainBuffer::new(chunk_len),
            output: ChainBuffer::new(chunk_len),
            stage: PipelineStage::AwaitingRead,
            closing: false,
            close_submitted: false,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn token(&self) -> ConnToken {
        self.token
    }

    pub(crate) fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: PipelineStage) {
        self.stage = stage;
    }

    pub(crate) fn input_mut(&mut self) -> &mut ChainBuffer {
        &mut self.input
    }

    pub(crate) fn output(&self) -> &ChainBuffer {
        &self.output
    }

    pub(crate) fn output_mut(&mut self) -> &mut ChainBuffer {
        &mut self.output
    }

    /// Copies buffered input into `dst`. An empty readable buffer at
    /// callback time is the EOF convention: it reports `PeerClosed` rather
    /// than a silent zero-length read.
    pub fn read(&mut self, dst: &mut [u8]) -> IoResult<usize> {
        if self.input.readable_len() == 0 {
            return Err(IoEngineError::PeerClosed);
        }
        Ok(self.input.read_from_buffer(dst))
    }

    /// Appends `src` to the output buffer. A zero-length write is a no-op.
    pub fn write(&mut self, src: &[u8]) -> IoResult<usize> {
        if src.is_empty() {
            return Ok(0);
        }
        Ok(self.output.write_into_buffer(src))
    }

    /// Marks the connection for close. The owning worker submits the
    /// actual close the next time it notices this flag (right after the
    /// write callback returns, or when a cross-thread close request for
    /// this connection's token is drained).
    pub fn close(&mut self) {
        self.closing = true;
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing
    }

    pub(crate) fn close_submitted(&self) -> bool {
        self.close_submitted
    }

    pub(crate) fn mark_close_submitted(&mut self) {
        self.closing = true;
        self.close_submitted = true;
        self.fd_owned = false;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Only reached if the connection is torn down without a CLOSED
        // completion ever being observed for it (e.g. submitting the close
        // itself failed). The kernel never got a chance to close the fd,
        // so do it here rather than leak it.
        if self.fd_owned {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}
