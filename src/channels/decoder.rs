//! Byte-capacity FIFO of `(payload, pts, size)` entries between demux and a
//! decoder, grounded on `BufferDecoder`.

use crate::kernel::{Event, Kernel};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One demultiplexed elementary-stream unit awaiting decode.
#[derive(Debug, Clone)]
pub struct DecoderEntry {
    /// Raw PES payload bytes.
    pub payload: Vec<u8>,
    /// Presentation timestamp, 90 kHz units.
    pub pts: i64,
    /// `payload.len()`, cached so capacity accounting doesn't re-measure it.
    pub size: usize,
}

struct Inner {
    queue: VecDeque<DecoderEntry>,
    fill: usize,
    capacity: usize,
    not_empty: Event,
    not_full: Event,
}

/// Bounded-byte-capacity FIFO; blocks writers until `fill + size <= capacity`
/// and readers while empty.
#[derive(Clone)]
pub struct DecoderBuffer {
    kernel: Kernel,
    inner: Rc<RefCell<Inner>>,
}

impl DecoderBuffer {
    /// Creates a buffer with a byte capacity of `capacity`.
    pub fn new(kernel: &Kernel, capacity: usize) -> Self {
        DecoderBuffer {
            kernel: kernel.clone(),
            inner: Rc::new(RefCell::new(Inner {
                queue: VecDeque::new(),
                fill: 0,
                capacity,
                not_empty: kernel.new_event(),
                not_full: kernel.new_event(),
            })),
        }
    }

    /// Blocks until `size` bytes of headroom exist, then enqueues the entry.
    pub async fn write(&self, payload: Vec<u8>, pts: i64) {
        let size = payload.len();
        loop {
            let has_room = {
                let inner = self.inner.borrow();
                inner.fill + size <= inner.capacity
            };
            if has_room {
                break;
            }
            let ev = self.inner.borrow().not_full.clone();
            self.kernel.wait(&ev).await;
        }
        let mut inner = self.inner.borrow_mut();
        inner.fill += size;
        inner.queue.push_back(DecoderEntry { payload, pts, size });
        let ev = inner.not_empty.clone();
        drop(inner);
        ev.notify();
    }

    /// Blocks until an entry is available, then pops it in FIFO order.
    pub async fn read(&self) -> DecoderEntry {
        loop {
            let empty = self.inner.borrow().queue.is_empty();
            if !empty {
                break;
            }
            let ev = self.inner.borrow().not_empty.clone();
            self.kernel.wait(&ev).await;
        }
        let mut inner = self.inner.borrow_mut();
        let entry = inner.queue.pop_front().expect("checked non-empty above");
        inner.fill -= entry.size;
        let ev = inner.not_full.clone();
        drop(inner);
        ev.notify();
        entry
    }

    /// Current occupied bytes. Invariant: equals the sum of queued entry sizes.
    pub fn fill(&self) -> usize {
        self.inner.borrow().fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn fill_tracks_sum_of_entry_sizes() {
        let kernel = Kernel::new();
        let buf = DecoderBuffer::new(&kernel, 100);
        {
            let buf = buf.clone();
            kernel.spawn("writer", async move {
                buf.write(vec![0u8; 10], 1000).await;
                buf.write(vec![0u8; 20], 2000).await;
            });
        }
        kernel.run(Duration::from_secs(1));
        assert_eq!(buf.fill(), 30);
    }

    #[test]
    fn read_reduces_fill_and_preserves_fifo_order() {
        let kernel = Kernel::new();
        let buf = DecoderBuffer::new(&kernel, 100);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let buf = buf.clone();
            kernel.spawn("writer", async move {
                buf.write(vec![0u8; 10], 1000).await;
                buf.write(vec![0u8; 10], 2000).await;
            });
        }
        {
            let buf = buf.clone();
            let seen = seen.clone();
            kernel.spawn("reader", async move {
                seen.borrow_mut().push(buf.read().await.pts);
                seen.borrow_mut().push(buf.read().await.pts);
            });
        }
        kernel.run(Duration::from_secs(1));
        assert_eq!(*seen.borrow(), vec![1000, 2000]);
        assert_eq!(buf.fill(), 0);
    }

    #[test]
    fn write_blocks_until_capacity_frees() {
        let kernel = Kernel::new();
        let buf = DecoderBuffer::new(&kernel, 15);
        let second_written = Rc::new(RefCell::new(false));
        {
            let buf = buf.clone();
            let second_written = second_written.clone();
            kernel.spawn("writer", async move {
                buf.write(vec![0u8; 10], 1000).await;
                buf.write(vec![0u8; 10], 2000).await;
                *second_written.borrow_mut() = true;
            });
        }
        kernel.run(Duration::from_secs(1));
        assert!(!*second_written.borrow());
        assert_eq!(buf.fill(), 10);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::time::Duration;

    /// §8: "DecoderBuffer: ∀ t, fill(t) = Σ size(entry)".
    #[quickcheck]
    fn fill_equals_sum_of_written_sizes(sizes: Vec<u8>) -> bool {
        let sizes: Vec<usize> = sizes.into_iter().map(|s| s as usize).collect();
        let total: usize = sizes.iter().sum();
        let kernel = Kernel::new();
        let buf = DecoderBuffer::new(&kernel, total.max(1));
        {
            let buf = buf.clone();
            let sizes = sizes.clone();
            kernel.spawn("writer", async move {
                for (i, sz) in sizes.into_iter().enumerate() {
                    buf.write(vec![0u8; sz], i as i64).await;
                }
            });
        }
        kernel.run(Duration::from_secs(1));
        buf.fill() == total
    }
}
