//! Discrete-event simulation kernel.
//!
//! Module bodies are ordinary `async fn`s that `.await` the two primitives this
//! kernel exposes: [`Kernel::wait`] on an [`Event`], and [`Kernel::wait_delay`]
//! on a virtual-time duration. Everything else — the ready queue, the delta-cycle
//! boundary, the timed-wait heap — is driven by a small single-threaded executor
//! built on the `futures` crate's `ArcWake`/`waker_ref` pattern rather than a
//! real-time async runtime, because a real reactor cannot give the literal FIFO
//! and delta-cycle guarantees this simulation depends on.

use futures::task::{waker_ref, ArcWake};
use std::cell::RefCell;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::cmp::Reverse;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

/// Identifies a spawned task for logging and deadlock diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

type BoxedTask = Pin<Box<dyn Future<Output = ()>>>;

struct TimedEntry {
    time: Duration,
    seq: u64,
    waker: Waker,
}

impl PartialEq for TimedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for TimedEntry {}
impl PartialOrd for TimedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

struct KernelInner {
    now: Duration,
    ready: VecDeque<TaskId>,
    tasks: HashMap<TaskId, BoxedTask>,
    names: HashMap<TaskId, String>,
    timed: BinaryHeap<Reverse<TimedEntry>>,
    delta_pending: Vec<Event>,
    next_task_id: u64,
    next_seq: u64,
}

/// Handle to the simulation kernel. Cheap to clone (reference-counted);
/// every module and channel holds one.
#[derive(Clone)]
pub struct Kernel {
    inner: Rc<RefCell<KernelInner>>,
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Kernel")
            .field("now", &inner.now)
            .field("ready_len", &inner.ready.len())
            .field("timed_len", &inner.timed.len())
            .finish()
    }
}

struct TaskWaker {
    task_id: TaskId,
    inner: Rc<RefCell<KernelInner>>,
}

// Safety note: this kernel never crosses a thread boundary. `ArcWake` does not
// itself require `Send + Sync`; we rely on single-threaded execution for soundness.
unsafe impl Send for TaskWaker {}
unsafe impl Sync for TaskWaker {}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let mut inner = arc_self.inner.borrow_mut();
        if !inner.ready.contains(&arc_self.task_id) {
            inner.ready.push_back(arc_self.task_id);
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Creates a fresh kernel with virtual time at zero.
    pub fn new() -> Self {
        Kernel {
            inner: Rc::new(RefCell::new(KernelInner {
                now: Duration::ZERO,
                ready: VecDeque::new(),
                tasks: HashMap::new(),
                names: HashMap::new(),
                timed: BinaryHeap::new(),
                delta_pending: Vec::new(),
                next_task_id: 0,
                next_seq: 0,
            })),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Current virtual time in fractional seconds, as most module formulas want it.
    pub fn now_secs(&self) -> f64 {
        self.now().as_secs_f64()
    }

    /// Registers a new event with no waiters.
    pub fn new_event(&self) -> Event {
        Event {
            inner: Rc::new(RefCell::new(EventInner { waiters: Vec::new() })),
        }
    }

    /// Spawns a cooperative task. `name` is used only in deadlock/log diagnostics.
    pub fn spawn<F>(&self, name: &str, fut: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = TaskId(inner.next_task_id);
        inner.next_task_id += 1;
        inner.tasks.insert(id, Box::pin(fut));
        inner.names.insert(id, name.to_string());
        inner.ready.push_back(id);
        id
    }

    /// Awaits an [`Event`] firing.
    pub fn wait<'a>(&'a self, event: &'a Event) -> EventWait<'a> {
        EventWait { event, registered: false }
    }

    /// Awaits `dur` of virtual time passing.
    pub fn wait_delay(&self, dur: Duration) -> DelayWait {
        DelayWait { kernel: self.clone(), dur, registered: false }
    }

    /// Awaits a zero-duration delta-cycle boundary. Equivalent to `wait_delay(Duration::ZERO)`
    /// but named for readability at call sites that want an explicit delta-cycle hop
    /// (e.g. `FillBuffer::read`'s forced boundary after each read).
    pub fn wait_zero(&self) -> DelayWait {
        self.wait_delay(Duration::ZERO)
    }

    fn push_timed(&self, time: Duration, waker: Waker) {
        let mut inner = self.inner.borrow_mut();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.timed.push(Reverse(TimedEntry { time, seq, waker }));
    }

    fn push_delta(&self, event: Event) {
        self.inner.borrow_mut().delta_pending.push(event);
    }

    fn poll_task(&self, task_id: TaskId) {
        let fut = self.inner.borrow_mut().tasks.remove(&task_id);
        let Some(mut fut) = fut else { return };
        let waker_impl = Arc::new(TaskWaker { task_id, inner: self.inner.clone() });
        let waker = waker_ref(&waker_impl);
        let mut cx = Context::from_waker(&waker);
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                self.inner.borrow_mut().names.remove(&task_id);
            }
            Poll::Pending => {
                self.inner.borrow_mut().tasks.insert(task_id, fut);
            }
        }
    }

    /// Runs the scheduling loop described in the design: drain the ready
    /// queue, deliver pending delta-cycle notifications, then advance to the
    /// next timed wakeup, until virtual time reaches `run_time`.
    pub fn run(&self, run_time: Duration) {
        loop {
            loop {
                let next = self.inner.borrow_mut().ready.pop_front();
                match next {
                    Some(task_id) => self.poll_task(task_id),
                    None => break,
                }
            }

            let delta = std::mem::take(&mut self.inner.borrow_mut().delta_pending);
            if !delta.is_empty() {
                for event in delta {
                    event.fire_now();
                }
                if !self.inner.borrow().ready.is_empty() {
                    continue;
                }
            }

            let next_time = self.inner.borrow().timed.peek().map(|Reverse(t)| t.time);
            match next_time {
                Some(time) if time < run_time => {
                    self.inner.borrow_mut().now = time;
                    loop {
                        let still_due = matches!(
                            self.inner.borrow().timed.peek(),
                            Some(Reverse(t)) if t.time == time
                        );
                        if !still_due {
                            break;
                        }
                        let entry = self.inner.borrow_mut().timed.pop();
                        if let Some(Reverse(entry)) = entry {
                            entry.waker.wake();
                        }
                    }
                    continue;
                }
                Some(_) => {
                    self.inner.borrow_mut().now = run_time;
                    break;
                }
                None => {
                    if !self.inner.borrow().tasks.is_empty() {
                        log::warn!(
                            target: "simulator::kernel",
                            "deadlock: {} task(s) still alive with nothing runnable or scheduled before runTime",
                            self.inner.borrow().tasks.len()
                        );
                    }
                    break;
                }
            }
        }
    }
}

struct EventInner {
    waiters: Vec<Waker>,
}

/// A named notification with no payload. Firing wakes every task currently
/// waiting on it; repeated notifies before anyone waits again simply collapse.
#[derive(Clone)]
pub struct Event {
    inner: Rc<RefCell<EventInner>>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("waiters", &self.inner.borrow().waiters.len())
            .finish()
    }
}

impl Event {
    fn fire_now(&self) {
        let waiters = std::mem::take(&mut self.inner.borrow_mut().waiters);
        for waker in waiters {
            waker.wake();
        }
    }

    /// Wakes every waiting task immediately.
    pub fn notify(&self) {
        self.fire_now();
    }

    /// Defers waking every waiting task to the next delta-cycle boundary.
    pub fn notify_zero(&self, kernel: &Kernel) {
        kernel.push_delta(self.clone());
    }

    fn register(&self, waker: &Waker) {
        self.inner.borrow_mut().waiters.push(waker.clone());
    }
}

/// Future returned by [`Kernel::wait`].
pub struct EventWait<'a> {
    event: &'a Event,
    registered: bool,
}

impl<'a> Future for EventWait<'a> {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.registered {
            Poll::Ready(())
        } else {
            self.event.register(cx.waker());
            self.registered = true;
            Poll::Pending
        }
    }
}

/// Future returned by [`Kernel::wait_delay`].
pub struct DelayWait {
    kernel: Kernel,
    dur: Duration,
    registered: bool,
}

impl Future for DelayWait {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.registered {
            Poll::Ready(())
        } else {
            let wake_time = self.kernel.now() + self.dur;
            self.kernel.push_timed(wake_time, cx.waker().clone());
            self.registered = true;
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc as StdRc;

    #[test]
    fn ready_tasks_run_in_fifo_order() {
        let kernel = Kernel::new();
        let order = StdRc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            kernel.spawn(&format!("t{i}"), async move {
                order.borrow_mut().push(i);
            });
        }
        kernel.run(Duration::from_secs(1));
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn delay_advances_virtual_time_deterministically() {
        let kernel = Kernel::new();
        let seen = StdRc::new(RefCell::new(None));
        {
            let kernel2 = kernel.clone();
            let seen = seen.clone();
            kernel.spawn("delayed", async move {
                kernel2.wait_delay(Duration::from_millis(500)).await;
                *seen.borrow_mut() = Some(kernel2.now());
            });
        }
        kernel.run(Duration::from_secs(2));
        assert_eq!(*seen.borrow(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn event_notify_wakes_waiter_same_instant() {
        let kernel = Kernel::new();
        let event = kernel.new_event();
        let woke = StdRc::new(RefCell::new(false));
        {
            let kernel2 = kernel.clone();
            let event2 = event.clone();
            let woke = woke.clone();
            kernel.spawn("waiter", async move {
                kernel2.wait(&event2).await;
                *woke.borrow_mut() = true;
            });
        }
        kernel.spawn("notifier", async move {
            event.notify();
        });
        kernel.run(Duration::from_secs(1));
        assert!(*woke.borrow());
    }

    #[test]
    fn notify_zero_defers_to_delta_cycle() {
        let kernel = Kernel::new();
        let event = kernel.new_event();
        let log = StdRc::new(RefCell::new(Vec::new()));
        {
            let kernel2 = kernel.clone();
            let event2 = event.clone();
            let log2 = log.clone();
            kernel.spawn("waiter", async move {
                kernel2.wait(&event2).await;
                log2.borrow_mut().push("woken");
            });
        }
        {
            let kernel2 = kernel.clone();
            let log2 = log.clone();
            kernel.spawn("notifier", async move {
                log2.borrow_mut().push("notifying");
                event.notify_zero(&kernel2);
            });
        }
        kernel.run(Duration::from_secs(1));
        assert_eq!(*log.borrow(), vec!["notifying", "woken"]);
    }
}
