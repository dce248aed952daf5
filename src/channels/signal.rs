//! Edge-triggered signal channels: `sc_signal<bool>` and `sc_buffer<T>`
//! equivalents. A write only notifies waiters when the value actually
//! changes, matching the request/reply sampling pattern used throughout the
//! clock-recovery and display-pull modules.

use crate::kernel::{Event, Kernel};
use std::cell::RefCell;
use std::rc::Rc;

struct ScalarInner {
    value: bool,
    changed: Event,
}

/// A boolean signal (request lines, `stcStarted`, frame-request edges, ...).
#[derive(Clone)]
pub struct SignalScalar {
    inner: Rc<RefCell<ScalarInner>>,
}

impl SignalScalar {
    /// Creates a signal at its initial value.
    pub fn new(kernel: &Kernel, initial: bool) -> Self {
        SignalScalar {
            inner: Rc::new(RefCell::new(ScalarInner { value: initial, changed: kernel.new_event() })),
        }
    }

    /// Writes `value`. Notifies waiters only if this differs from the
    /// current value.
    pub fn write(&self, value: bool) {
        let mut inner = self.inner.borrow_mut();
        if inner.value == value {
            return;
        }
        inner.value = value;
        let ev = inner.changed.clone();
        drop(inner);
        ev.notify();
    }

    /// Current value.
    pub fn read(&self) -> bool {
        self.inner.borrow().value
    }

    /// A reader handle that can await changes independently of the writer.
    pub fn reader(&self) -> SignalScalarReader {
        SignalScalarReader { inner: self.inner.clone() }
    }
}

/// Read side of a [`SignalScalar`], usable from a task that only observes.
#[derive(Clone)]
pub struct SignalScalarReader {
    inner: Rc<RefCell<ScalarInner>>,
}

impl SignalScalarReader {
    /// Current value.
    pub fn read(&self) -> bool {
        self.inner.borrow().value
    }

    /// Awaits the next change on this signal, then returns the new value.
    pub async fn changed(&self, kernel: &Kernel) -> bool {
        let ev = self.inner.borrow().changed.clone();
        kernel.wait(&ev).await;
        self.read()
    }
}

struct BufferInner<T> {
    value: Option<T>,
    changed: Event,
}

/// A value-carrying signal (PCR samples, STC replies, display frame
/// pass-through). `T` must be comparable so writes can detect "no change".
#[derive(Clone)]
pub struct SignalBuffer<T> {
    inner: Rc<RefCell<BufferInner<T>>>,
}

impl<T: PartialEq + Clone> SignalBuffer<T> {
    /// Creates an unset signal.
    pub fn new(kernel: &Kernel) -> Self {
        SignalBuffer {
            inner: Rc::new(RefCell::new(BufferInner { value: None, changed: kernel.new_event() })),
        }
    }

    /// Writes `value`, notifying waiters only if it differs from the
    /// current value (an unset signal always counts as a change).
    pub fn write(&self, value: T) {
        let mut inner = self.inner.borrow_mut();
        let differs = inner.value.as_ref() != Some(&value);
        if !differs {
            return;
        }
        inner.value = Some(value);
        let ev = inner.changed.clone();
        drop(inner);
        ev.notify();
    }

    /// Current value, if one has ever been written.
    pub fn read(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }

    /// A reader handle.
    pub fn reader(&self) -> SignalBufferReader<T> {
        SignalBufferReader { inner: self.inner.clone() }
    }
}

/// Read side of a [`SignalBuffer`].
#[derive(Clone)]
pub struct SignalBufferReader<T> {
    inner: Rc<RefCell<BufferInner<T>>>,
}

impl<T: Clone> SignalBufferReader<T> {
    /// Current value, if one has ever been written.
    pub fn read(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }

    /// Awaits the next change on this signal, then returns the new value.
    pub async fn changed(&self, kernel: &Kernel) -> Option<T> {
        let ev = self.inner.borrow().changed.clone();
        kernel.wait(&ev).await;
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn scalar_write_is_a_noop_when_unchanged() {
        let kernel = Kernel::new();
        let sig = SignalScalar::new(&kernel, false);
        let reader = sig.reader();
        let woke = Rc::new(RefCell::new(false));
        {
            let woke = woke.clone();
            let kernel2 = kernel.clone();
            kernel.spawn("waiter", async move {
                reader.changed(&kernel2).await;
                *woke.borrow_mut() = true;
            });
        }
        sig.write(false); // same value, should not notify
        kernel.run(Duration::from_millis(1));
        assert!(!*woke.borrow());
    }

    #[test]
    fn scalar_write_notifies_on_change() {
        let kernel = Kernel::new();
        let sig = SignalScalar::new(&kernel, false);
        let reader = sig.reader();
        let seen = Rc::new(RefCell::new(None));
        {
            let seen = seen.clone();
            let kernel2 = kernel.clone();
            kernel.spawn("waiter", async move {
                let v = reader.changed(&kernel2).await;
                *seen.borrow_mut() = Some(v);
            });
        }
        kernel.spawn("writer", {
            let sig = sig.clone();
            async move { sig.write(true) }
        });
        kernel.run(Duration::from_secs(1));
        assert_eq!(*seen.borrow(), Some(true));
    }

    #[test]
    fn buffer_first_write_always_counts_as_change() {
        let kernel = Kernel::new();
        let sig: SignalBuffer<u64> = SignalBuffer::new(&kernel);
        let reader = sig.reader();
        let seen = Rc::new(RefCell::new(None));
        {
            let seen = seen.clone();
            let kernel2 = kernel.clone();
            kernel.spawn("waiter", async move {
                let v = reader.changed(&kernel2).await;
                *seen.borrow_mut() = Some(v);
            });
        }
        kernel.spawn("writer", {
            let sig = sig.clone();
            async move { sig.write(42) }
        });
        kernel.run(Duration::from_secs(1));
        assert_eq!(*seen.borrow(), Some(Some(42)));
    }
}
