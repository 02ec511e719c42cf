//! Chunked scatter-gather buffers.
//!
//! [`ChainBuffer`] replaces a single contiguous growable buffer with a list
//! of fixed-size chunks, so that a chunk pinned by an in-flight vectored
//! `io_uring` operation is never invalidated by a concurrent resize.

mod chain_buffer;
mod chunk;
mod pinned;

pub use chain_buffer::ChainBuffer;
pub use pinned::PinnedVectors;
