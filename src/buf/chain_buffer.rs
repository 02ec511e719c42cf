use std::collections::VecDeque;

use super::chunk::Chunk;
use super::pinned::PinnedVectors;

/// Chunks allocated up front: one "current" chunk plus 2 spares, so the
/// first couple of writes past the initial chunk don't need to allocate.
const INITIAL_CHUNKS: usize = 3;

/// A growable, chunked byte buffer backing one direction (read or write) of
/// a connection.
///
/// Storage is a list of fixed-size chunks rather than one contiguous
/// allocation, so that a chunk already pinned by an in-flight `io_uring`
/// operation is never invalidated by a later write growing the buffer.
/// `data_len` tracks how many chunks, counted from the front, currently
/// make up the buffer's logical readable region; the chunk at
/// `data_len - 1` is the last chunk with data — new writes land there
/// first and only spill into further chunks once it's full.
pub struct ChainBuffer {
    chunks: VecDeque<Chunk>,
    chunk_len: usize,
    data_len: usize,
}

impl ChainBuffer {
    pub fn new(chunk_len: usize) -> Self {
        let mut chunks = VecDeque::with_capacity(INITIAL_CHUNKS);
        for _ in 0..INITIAL_CHUNKS {
            chunks.push_back(Chunk::new(chunk_len));
        }
        Self {
            chunks,
            chunk_len,
            data_len: 1,
        }
    }

    /// Total readable bytes currently buffered.
    pub fn readable_len(&self) -> usize {
        self.chunks
            .iter()
            .take(self.data_len)
            .map(Chunk::readable_len)
            .sum()
    }

    /// Copies buffered bytes into `dst`, draining them from the front of
    /// the list. Fully-drained leading chunks rotate to the tail so their
    /// capacity is reused by later writes instead of growing the list.
    pub fn read_from_buffer(&mut self, dst: &mut [u8]) -> usize {
        let mut transferred = 0;
        let mut idx = 0;
        while transferred < dst.len() && idx < self.data_len {
            let n = self.chunks[idx].read_from(&mut dst[transferred..]);
            transferred += n;
            if n == 0 || idx == self.data_len - 1 {
                break;
            }
            idx += 1;
        }
        self.rotate_drained_prefix();
        transferred
    }

    /// Appends `src`, starting at the current last-with-data chunk and
    /// spilling forward into already-allocated chunks, expanding the list
    /// only once those are exhausted.
    pub fn write_into_buffer(&mut self, src: &[u8]) -> usize {
        if src.is_empty() {
            return 0;
        }
        let total = src.len();
        let mut transferred = 0;
        let mut idx = self.data_len - 1;
        loop {
            let n = self.chunks[idx].write_into(&src[transferred..]);
            transferred += n;
            if idx == self.chunks.len() - 1 {
                let rest = total - transferred;
                if rest > 0 {
                    let writable_now = self.chunks[idx].writable_len();
                    let needed = rest.saturating_sub(writable_now) / self.chunk_len + 1;
                    self.expand(needed);
                }
            }
            if transferred == total {
                self.data_len = idx + 1;
                break;
            }
            idx += 1;
        }
        transferred
    }

    /// Builds the scatter-gather vectors covering the readable region
    /// (`chunks[0..data_len]`), for submission as a vectored write.
    pub fn materialize_readable_vectors(&self) -> PinnedVectors {
        let mut iovecs = Vec::with_capacity(self.data_len);
        for chunk in self.chunks.iter().take(self.data_len) {
            let len = chunk.readable_len();
            if len == 0 {
                continue;
            }
            iovecs.push(libc::iovec {
                iov_base: chunk.readable_ptr() as *mut libc::c_void,
                iov_len: len,
            });
        }
        PinnedVectors::new(iovecs)
    }

    /// Builds the scatter-gather vectors covering the writable region
    /// (the whole chunk list), for submission as a vectored read.
    pub fn materialize_writable_vectors(&mut self) -> PinnedVectors {
        let mut iovecs = Vec::with_capacity(self.chunks.len());
        for chunk in self.chunks.iter_mut() {
            let len = chunk.writable_len();
            if len == 0 {
                continue;
            }
            iovecs.push(libc::iovec {
                iov_base: chunk.writable_ptr() as *mut libc::c_void,
                iov_len: len,
            });
        }
        PinnedVectors::new(iovecs)
    }

    /// Advances the readable region by `n` bytes after a completed
    /// vectored write, rotating any chunk this drains to empty to the
    /// tail of the list.
    pub fn advance_readable(&mut self, mut n: usize) {
        let mut idx = 0;
        while n > 0 && idx < self.data_len {
            let chunk = &mut self.chunks[idx];
            let take = chunk.readable_len().min(n);
            chunk.advance_read(take);
            n -= take;
            idx += 1;
        }
        self.rotate_drained_prefix();
    }

    /// Advances the writable region by `n` bytes after a completed
    /// vectored read, moving the last-with-data marker forward if the
    /// kernel wrote past the chunk it previously pointed to.
    pub fn advance_writable(&mut self, mut n: usize) {
        let mut idx = 0;
        while n > 0 && idx < self.chunks.len() {
            let chunk = &mut self.chunks[idx];
            let take = chunk.writable_len().min(n);
            if take > 0 {
                chunk.advance_write(take);
                n -= take;
                if idx + 1 > self.data_len {
                    self.data_len = idx + 1;
                }
            }
            idx += 1;
        }
    }

    fn expand(&mut self, count: usize) {
        for _ in 0..count {
            self.chunks.push_back(Chunk::new(self.chunk_len));
        }
    }

    /// Rotates fully-drained chunks from the front of the list to the
    /// back, resetting them for reuse. Always leaves at least one chunk
    /// as the last-with-data placeholder, even when the buffer is empty.
    fn rotate_drained_prefix(&mut self) {
        while self.data_len > 1 && self.chunks[0].readable_len() == 0 {
            let mut drained = self.chunks.pop_front().expect("chunk list never empty");
            drained.reset();
            self.chunks.push_back(drained);
            self.data_len -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_all(buf: &mut ChainBuffer) -> Vec<u8> {
        let mut out = vec![0u8; buf.readable_len()];
        let n = buf.read_from_buffer(&mut out);
        out.truncate(n);
        out
    }

    #[test]
    fn write_and_read_within_one_chunk() {
        let mut buf = ChainBuffer::new(1024);
        assert_eq!(buf.write_into_buffer(b"hello"), 5);
        assert_eq!(drain_all(&mut buf), b"hello");
    }

    #[test]
    fn write_exactly_on_chunk_boundaries_does_not_over_allocate() {
        let mut buf = ChainBuffer::new(1024);
        let payload = vec![7u8; 1024 * 3];
        assert_eq!(buf.write_into_buffer(&payload), payload.len());
        // Exactly filling the three pre-allocated chunks must not grow the list.
        assert_eq!(buf.chunks.len(), INITIAL_CHUNKS);
        assert_eq!(drain_all(&mut buf), payload);
    }

    #[test]
    fn write_past_initial_capacity_expands() {
        let mut buf = ChainBuffer::new(1024);
        let payload = vec![9u8; 1024 * 3 + 100];
        assert_eq!(buf.write_into_buffer(&payload), payload.len());
        assert!(buf.chunks.len() > INITIAL_CHUNKS);
        assert_eq!(drain_all(&mut buf), payload);
    }

    #[test]
    fn partial_read_leaves_remainder_in_place() {
        let mut buf = ChainBuffer::new(8);
        buf.write_into_buffer(b"abcdefgh");
        let mut first = [0u8; 3];
        assert_eq!(buf.read_from_buffer(&mut first), 3);
        assert_eq!(&first, b"abc");
        assert_eq!(buf.readable_len(), 5);
        let rest = drain_all(&mut buf);
        assert_eq!(rest, b"defgh");
    }

    #[test]
    fn chunks_rotate_to_tail_once_drained() {
        let mut buf = ChainBuffer::new(4);
        buf.write_into_buffer(b"abcdefgh");
        let front_ptr_before = buf.chunks[0].readable_ptr();
        let mut out = [0u8; 8];
        assert_eq!(buf.read_from_buffer(&mut out), 8);
        assert_eq!(&out, b"abcdefgh");
        // The drained chunks rotated: writing again should reuse them, not
        // grow the list.
        let len_before = buf.chunks.len();
        buf.write_into_buffer(b"z");
        assert_eq!(buf.chunks.len(), len_before);
        let _ = front_ptr_before;
    }

    #[test]
    fn vectored_read_completion_extends_past_old_boundary() {
        // A chunk-spanning kernel read should move the last-with-data
        // marker forward even though write_into_buffer never touched those
        // later chunks directly.
        let mut buf = ChainBuffer::new(4);
        let vectors = buf.materialize_writable_vectors();
        assert!(vectors.len() >= 2);
        buf.advance_writable(6);
        assert_eq!(buf.readable_len(), 6);
        let out = drain_all(&mut buf);
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn zero_length_write_is_a_no_op() {
        let mut buf = ChainBuffer::new(16);
        assert_eq!(buf.write_into_buffer(b""), 0);
        assert_eq!(buf.readable_len(), 0);
    }
}
