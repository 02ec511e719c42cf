//! A single fixed-size chunk in a [`super::ChainBuffer`]'s chunk list.

/// One node of a [`super::ChainBuffer`]'s chunk list.
///
/// A chunk never resizes after creation: its capacity is fixed at
/// construction and stays that way for the chunk's whole life, which is
/// what lets pinned scatter-gather pointers into its storage stay valid
/// across a chunk's moves between front and back of the list.
pub(crate) struct Chunk {
    buf: Box<[u8]>,
    read_idx: usize,
    write_idx: usize,
}

impl Chunk {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            buf: vec![0u8; len].into_boxed_slice(),
            read_idx: 0,
            write_idx: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn readable_len(&self) -> usize {
        self.write_idx - self.read_idx
    }

    pub(crate) fn writable_len(&self) -> usize {
        self.buf.len() - self.write_idx
    }

    pub(crate) fn read_idx(&self) -> usize {
        self.read_idx
    }

    pub(crate) fn write_idx(&self) -> usize {
        self.write_idx
    }

    pub(crate) fn advance_read(&mut self, n: usize) {
        self.read_idx += n;
        debug_assert!(self.read_idx <= self.write_idx);
    }

    pub(crate) fn advance_write(&mut self, n: usize) {
        self.write_idx += n;
        debug_assert!(self.write_idx <= self.buf.len());
    }

    /// Pointer to the readable region, i.e. `buf[read_idx..write_idx]`.
    pub(crate) fn readable_ptr(&self) -> *const u8 {
        unsafe { self.buf.as_ptr().add(self.read_idx) }
    }

    /// Pointer to the writable region, i.e. `buf[write_idx..]`.
    pub(crate) fn writable_ptr(&mut self) -> *mut u8 {
        unsafe { self.buf.as_mut_ptr().add(self.write_idx) }
    }

    /// Drains readable bytes into `dst`, returning the number copied.
    pub(crate) fn read_from(&mut self, dst: &mut [u8]) -> usize {
        let readable = self.readable_len();
        let n = readable.min(dst.len());
        dst[..n].copy_from_slice(&self.buf[self.read_idx..self.read_idx + n]);
        self.read_idx += n;
        n
    }

    /// Appends bytes from `src`, compacting first if the writable suffix
    /// can't hold them but the chunk has enough total free space.
    pub(crate) fn write_into(&mut self, src: &[u8]) -> usize {
        if self.writable_len() < src.len() {
            self.move_inside();
        }
        let writable = self.writable_len();
        let n = writable.min(src.len());
        self.buf[self.write_idx..self.write_idx + n].copy_from_slice(&src[..n]);
        self.write_idx += n;
        n
    }

    /// Compacts the chunk by sliding its readable region down to offset 0,
    /// widening the writable suffix. Handles overlapping source/dest ranges
    /// with a segmented copy.
    pub(crate) fn move_inside(&mut self) {
        if self.read_idx == 0 {
            return;
        }
        if self.read_idx == self.write_idx {
            self.read_idx = 0;
            self.write_idx = 0;
            return;
        }
        let valid_bytes = self.readable_len();
        if valid_bytes < self.read_idx {
            // No overlap between the source and destination ranges.
            self.buf.copy_within(self.read_idx..self.write_idx, 0);
        } else {
            // Overlapping ranges: copy forward in read_idx-sized segments.
            let mut dst_pos = 0;
            let mut src_pos = self.read_idx;
            let segment = self.read_idx;
            while self.write_idx - src_pos > segment {
                self.buf.copy_within(src_pos..src_pos + segment, dst_pos);
                src_pos += segment;
                dst_pos += segment;
            }
            self.buf.copy_within(src_pos..self.write_idx, dst_pos);
        }
        self.read_idx = 0;
        self.write_idx = valid_bytes;
    }

    /// Resets indices to 0 so the chunk's whole capacity is writable again.
    /// Used when a fully-drained chunk rotates to the tail of the list.
    pub(crate) fn reset(&mut self) {
        self.read_idx = 0;
        self.write_idx = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut c = Chunk::new(16);
        assert_eq!(c.write_into(b"hello"), 5);
        let mut out = [0u8; 5];
        assert_eq!(c.read_from(&mut out), 5);
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn write_into_caps_at_writable_len() {
        let mut c = Chunk::new(4);
        assert_eq!(c.write_into(b"abcdef"), 4);
        assert_eq!(c.writable_len(), 0);
    }

    #[test]
    fn move_inside_compacts_non_overlapping() {
        let mut c = Chunk::new(8);
        c.write_into(b"abcd");
        let mut buf = [0u8; 2];
        c.read_from(&mut buf);
        assert_eq!(c.read_idx(), 2);
        c.move_inside();
        assert_eq!(c.read_idx(), 0);
        assert_eq!(c.write_idx(), 2);
    }

    #[test]
    fn move_inside_compacts_overlapping_ranges() {
        // read_idx small relative to readable span forces the segmented
        // copy branch.
        let mut c = Chunk::new(8);
        c.write_into(b"ab");
        let mut buf = [0u8; 1];
        c.read_from(&mut buf);
        c.write_into(b"cdefg");
        assert_eq!(c.readable_len(), 6);
        c.move_inside();
        assert_eq!(c.read_idx(), 0);
        let mut out = [0u8; 6];
        c.read_from(&mut out);
        assert_eq!(&out, b"bcdefg");
    }

    #[test]
    fn reset_reopens_full_capacity() {
        let mut c = Chunk::new(4);
        c.write_into(b"ab");
        c.read_from(&mut [0u8; 2]);
        c.reset();
        assert_eq!(c.writable_len(), 4);
        assert_eq!(c.readable_len(), 0);
    }
}
