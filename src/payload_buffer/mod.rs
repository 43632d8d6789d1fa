//! Shared payload buffer: one contiguous byte region, offset-addressed
//! writes from peer sessions.
//!
//! Because the single-claim invariant on pieces guarantees that no two
//! live sessions ever write to overlapping byte ranges, this is
//! deliberately an *unsynchronized* mutable region
//! rather than a `Mutex<Vec<u8>>`. The happens-before edge the buffer
//! relies on for the final, safe read is established by `JoinHandle::join`
//! in `crate::swarm` — every session's writes are visible to the
//! coordinator once that session's thread has been joined.

use std::cell::UnsafeCell;

pub struct PayloadBuffer {
    bytes: UnsafeCell<Vec<u8>>,
}

// Safety: callers only ever call `write_at` for a piece they hold the sole
// claim to (enforced by `WorkQueue`: a `PieceWork` is owned by exactly one
// session at a time), so concurrent calls from different sessions always
// target disjoint byte ranges. `into_inner` is only called by the
// coordinator after every session thread has been joined, which provides
// the happens-before edge required to observe those writes safely.
unsafe impl Sync for PayloadBuffer {}

impl PayloadBuffer {
    pub fn new(total_size: u64) -> Self {
        Self {
            bytes: UnsafeCell::new(vec![0u8; total_size as usize]),
        }
    }

    /// Writes `data` at absolute byte offset `offset`. Panics if the range
    /// falls outside the buffer — that would indicate a bug in piece/block
    /// offset arithmetic upstream, not a recoverable runtime condition.
    ///
    /// # Safety
    /// The caller must hold exclusive claim to the byte range
    /// `[offset, offset + data.len())`, i.e. to the piece that range
    /// belongs to (see module docs).
    pub fn write_at(&self, offset: u64, data: &[u8]) {
        let offset = offset as usize;
        // SAFETY: disjoint-write invariant documented on the type and relied
        // upon by every caller in `crate::peer::session`.
        let slice = unsafe { &mut *self.bytes.get() };
        slice[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Reads back a range. Only meaningful for a piece this thread has
    /// already fully written (used for digest verification right after the
    /// last block of a piece lands).
    pub fn read_at(&self, offset: u64, len: u64) -> Vec<u8> {
        let offset = offset as usize;
        let len = len as usize;
        // SAFETY: same disjoint-write invariant as `write_at`; verification
        // only reads a range this session itself just finished writing.
        let slice = unsafe { &*self.bytes.get() };
        slice[offset..offset + len].to_vec()
    }

    /// Consumes the buffer. Only called by the coordinator after every
    /// session thread has been joined (see module docs for the
    /// happens-before argument).
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn write_then_read_round_trips() {
        let buf = PayloadBuffer::new(16);
        buf.write_at(4, &[1, 2, 3, 4]);
        assert_eq!(buf.read_at(4, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn disjoint_concurrent_writes_from_different_threads_are_all_visible() {
        let buf = Arc::new(PayloadBuffer::new(4096));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let buf = buf.clone();
                thread::spawn(move || {
                    let chunk = vec![i as u8; 512];
                    buf.write_at(i as u64 * 512, &chunk);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let data = buf.into_inner();
        for i in 0..8u64 {
            let start = (i * 512) as usize;
            assert!(data[start..start + 512].iter().all(|&b| b == i as u8));
        }
    }
}
