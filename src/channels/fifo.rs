//! Bounded-element-count FIFO with an additional non-blocking write path.
//!
//! Grounded on `BufferFiFo`: a blocking write always succeeds by copying the
//! payload into a freshly owned buffer before enqueuing; a non-blocking write
//! variant reports whether it had room rather than suspending the caller.

use crate::kernel::{Event, Kernel};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

struct Inner {
    queue: VecDeque<Vec<u8>>,
    capacity: usize,
    not_empty: Event,
    not_full: Event,
}

/// Bounded FIFO of owned byte buffers.
#[derive(Clone)]
pub struct FiFoBuffer {
    kernel: Kernel,
    inner: Rc<RefCell<Inner>>,
}

impl FiFoBuffer {
    /// Creates a FIFO holding at most `capacity` entries.
    pub fn new(kernel: &Kernel, capacity: usize) -> Self {
        FiFoBuffer {
            kernel: kernel.clone(),
            inner: Rc::new(RefCell::new(Inner {
                queue: VecDeque::new(),
                capacity,
                not_empty: kernel.new_event(),
                not_full: kernel.new_event(),
            })),
        }
    }

    /// Blocks until there is room, copies `data` into an owned buffer, and
    /// enqueues it.
    pub async fn write(&self, data: &[u8]) {
        loop {
            let full = {
                let inner = self.inner.borrow();
                inner.queue.len() >= inner.capacity
            };
            if !full {
                break;
            }
            let ev = self.inner.borrow().not_full.clone();
            self.kernel.wait(&ev).await;
        }
        let owned = data.to_vec();
        let mut inner = self.inner.borrow_mut();
        inner.queue.push_back(owned);
        let ev = inner.not_empty.clone();
        drop(inner);
        ev.notify();
    }

    /// Attempts to enqueue without blocking. Returns `false` if the buffer
    /// was full and nothing was written.
    pub fn try_write(&self, data: &[u8]) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.queue.len() >= inner.capacity {
            return false;
        }
        inner.queue.push_back(data.to_vec());
        let ev = inner.not_empty.clone();
        drop(inner);
        ev.notify();
        true
    }

    /// Blocks until an entry is available, then hands ownership of it to the
    /// caller.
    pub async fn read(&self) -> Vec<u8> {
        loop {
            let empty = self.inner.borrow().queue.is_empty();
            if !empty {
                break;
            }
            let ev = self.inner.borrow().not_empty.clone();
            self.kernel.wait(&ev).await;
        }
        let mut inner = self.inner.borrow_mut();
        let value = inner.queue.pop_front().expect("checked non-empty above");
        let ev = inner.not_full.clone();
        drop(inner);
        ev.notify();
        value
    }

    /// Clears all queued entries. A genuine clear, not the no-op the
    /// original's `reset()` happened to be.
    pub fn reset(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.queue.clear();
        let ev = inner.not_full.clone();
        drop(inner);
        ev.notify();
    }

    /// Current element count.
    pub fn fill(&self) -> usize {
        self.inner.borrow().queue.len()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::time::Duration;

    /// §8: "∀ channels, ∀ times t: 0 ≤ fill(t) ≤ capacity".
    #[quickcheck]
    fn try_write_never_exceeds_capacity(capacity: u8, items: Vec<Vec<u8>>) -> bool {
        let capacity = (capacity as usize).max(1);
        let kernel = Kernel::new();
        let buf = FiFoBuffer::new(&kernel, capacity);
        for item in &items {
            buf.try_write(item);
        }
        buf.fill() <= capacity
    }

    /// §8: "Writing N elements to a FiFoBuffer then reading N returns the
    /// same byte sequences in order."
    #[quickcheck]
    fn write_then_read_round_trips(items: Vec<Vec<u8>>) -> bool {
        if items.len() > 16 {
            return true; // keep the scheduled task count bounded
        }
        let n = items.len();
        let kernel = Kernel::new();
        let buf = FiFoBuffer::new(&kernel, n.max(1));
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let buf = buf.clone();
            let items = items.clone();
            kernel.spawn("writer", async move {
                for item in items {
                    buf.write(&item).await;
                }
            });
        }
        {
            let buf = buf.clone();
            let seen = seen.clone();
            kernel.spawn("reader", async move {
                for _ in 0..n {
                    seen.borrow_mut().push(buf.read().await);
                }
            });
        }
        kernel.run(Duration::from_secs(1));
        *seen.borrow() == items
    }
}
