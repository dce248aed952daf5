//! Fixed-element-capacity buffer with filling/draining hysteresis.
//!
//! Grounded on the fill/drain state machine of the original `BufferFill`:
//! writes are admitted only while "filling" (until the element count hits
//! capacity), then the channel flips to "draining" (reads admitted, writes
//! blocked) until it empties out again.

use crate::kernel::{Event, Kernel};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

struct Inner<T> {
    queue: VecDeque<T>,
    capacity: usize,
    draining: bool,
    not_empty: Event,
    not_full: Event,
}

/// A bounded FIFO of `capacity` elements. See module docs for the
/// filling/draining hysteresis.
#[derive(Clone)]
pub struct FillBuffer<T> {
    kernel: Kernel,
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> FillBuffer<T> {
    /// Creates a buffer holding at most `capacity` elements.
    pub fn new(kernel: &Kernel, capacity: usize) -> Self {
        FillBuffer {
            kernel: kernel.clone(),
            inner: Rc::new(RefCell::new(Inner {
                queue: VecDeque::new(),
                capacity,
                draining: false,
                not_empty: kernel.new_event(),
                not_full: kernel.new_event(),
            })),
        }
    }

    /// Blocks while the buffer is draining (full, not yet emptied), then
    /// pushes `value`. Once the push fills the buffer to `capacity`, the
    /// buffer flips to draining and further writes block until a reader has
    /// emptied it out completely.
    pub async fn write(&self, value: T) {
        loop {
            let blocked = self.inner.borrow().draining;
            if !blocked {
                break;
            }
            let ev = self.inner.borrow().not_full.clone();
            self.kernel.wait(&ev).await;
        }

        let mut inner = self.inner.borrow_mut();
        inner.queue.push_back(value);
        if inner.queue.len() >= inner.capacity {
            inner.draining = true;
        }
        let ev = inner.not_empty.clone();
        drop(inner);
        ev.notify();
    }

    /// Blocks until the buffer is full (draining), then pops the oldest
    /// element. Only once the buffer empties out completely does it flip
    /// back to filling and admit writes again. Forces a zero-time wait
    /// afterward so ordering with any observer of this channel's fill level
    /// stays deterministic across a delta cycle.
    pub async fn read(&self) -> T {
        loop {
            let ready = self.inner.borrow().draining;
            if ready {
                break;
            }
            let ev = self.inner.borrow().not_empty.clone();
            self.kernel.wait(&ev).await;
        }

        let value = {
            let mut inner = self.inner.borrow_mut();
            let value = inner.queue.pop_front().expect("checked draining (i.e. non-empty) above");
            if inner.queue.is_empty() {
                inner.draining = false;
            }
            let ev = inner.not_full.clone();
            drop(inner);
            ev.notify();
            value
        };

        self.kernel.wait_zero().await;
        value
    }

    /// Current element count.
    pub fn fill(&self) -> usize {
        self.inner.borrow().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn write_then_read_preserves_order() {
        // Reads only unblock once the buffer is completely full, so the
        // writer must fill it to capacity before the reader can drain it.
        let kernel = Kernel::new();
        let buf: FillBuffer<u32> = FillBuffer::new(&kernel, 2);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let buf = buf.clone();
            kernel.spawn("writer", async move {
                buf.write(1).await;
                buf.write(2).await;
            });
        }
        {
            let buf = buf.clone();
            let seen = seen.clone();
            kernel.spawn("reader", async move {
                let a = buf.read().await;
                let b = buf.read().await;
                seen.borrow_mut().push(a);
                seen.borrow_mut().push(b);
            });
        }
        kernel.run(Duration::from_secs(1));
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn write_blocks_when_full() {
        let kernel = Kernel::new();
        let buf: FillBuffer<u32> = FillBuffer::new(&kernel, 1);
        let progressed = Rc::new(RefCell::new(false));
        {
            let buf = buf.clone();
            let progressed = progressed.clone();
            kernel.spawn("writer", async move {
                buf.write(1).await;
                buf.write(2).await;
                *progressed.borrow_mut() = true;
            });
        }
        kernel.run(Duration::from_secs(1));
        assert!(!*progressed.borrow());
        assert_eq!(buf.fill(), 1);
    }
}
