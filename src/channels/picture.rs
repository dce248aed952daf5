//! PTS-keyed, refcounted picture buffer.
//!
//! Grounded on `BufferPicture`'s `nbread` latest-usable-frame selector (see
//! the component design notes this crate's spec carries for `Sync`): among
//! candidates inside a sliding window below the requested time, the newest
//! wins; every other candidate — including superseded running-maxima and the
//! final winner itself — is queued for a refcount decrement once the scan
//! completes.

use crate::kernel::{Event, Kernel};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Guards against 33-bit PTS wrap being misread as a huge backwards jump.
pub const WRAP_OFFSET: i64 = 500_000_000;

struct Entry {
    payload: Vec<u8>,
    refcount: u32,
}

struct Inner {
    entries: BTreeMap<i64, Entry>,
    capacity: usize,
    last_request: i64,
    not_full: Event,
    delete_event: Event,
}

/// Bounded, PTS-keyed buffer of decoded pictures with explicit two-party
/// refcounting (producer + consumer each hold one reference).
#[derive(Clone)]
pub struct PictureBuffer {
    kernel: Kernel,
    inner: Rc<RefCell<Inner>>,
}

/// Result of [`PictureBuffer::nbread`].
pub struct PictureRead {
    /// The selected picture's bytes, or `None` if nothing satisfied the window.
    pub payload: Option<Vec<u8>>,
    /// The PTS the selection used, or `0` if nothing was returned.
    pub pts: i64,
}

impl PictureBuffer {
    /// Creates a buffer holding at most `capacity` pictures.
    pub fn new(kernel: &Kernel, capacity: usize) -> Self {
        PictureBuffer {
            kernel: kernel.clone(),
            inner: Rc::new(RefCell::new(Inner {
                entries: BTreeMap::new(),
                capacity,
                last_request: i64::MIN,
                not_full: kernel.new_event(),
                delete_event: kernel.new_event(),
            })),
        }
    }

    /// Blocks until there is room, then inserts `payload` at `pts`. If `pts`
    /// is already in use, increments the key by 1 until a free slot is found
    /// (a warning condition upstream callers should log) and returns the key
    /// actually used. Each entry starts with a refcount of 2.
    pub async fn write(&self, payload: Vec<u8>, pts: i64) -> i64 {
        loop {
            let full = {
                let inner = self.inner.borrow();
                inner.entries.len() >= inner.capacity
            };
            if !full {
                break;
            }
            let ev = self.inner.borrow().delete_event.clone();
            self.kernel.wait(&ev).await;
        }

        let mut inner = self.inner.borrow_mut();
        let mut key = pts;
        while inner.entries.contains_key(&key) {
            key += 1;
        }
        inner.entries.insert(key, Entry { payload, refcount: 2 });
        key
    }

    /// The latest-usable-frame selector driving display pull.
    pub async fn nbread(&self, pt: i64) -> PictureRead {
        let mut to_release: Vec<i64> = Vec::new();
        let mut winner: Option<(i64, Vec<u8>)> = None;

        {
            let mut inner = self.inner.borrow_mut();

            if pt < inner.last_request {
                log::warn!(target: "simulator::picture_buffer", "nbread called with pt {pt} behind lastRequest {}", inner.last_request);
                for (&key, _) in inner.entries.iter() {
                    if key > inner.last_request {
                        to_release.push(key);
                    }
                }
            }

            if !inner.entries.is_empty() {
                for (&key, entry) in inner.entries.iter() {
                    if pt - WRAP_OFFSET < key && key < pt {
                        match &winner {
                            Some((best_key, _)) if *best_key >= key => {
                                to_release.push(key);
                            }
                            Some((best_key, _)) => {
                                to_release.push(*best_key);
                                winner = Some((key, entry.payload.clone()));
                            }
                            None => {
                                winner = Some((key, entry.payload.clone()));
                            }
                        }
                    }
                }
                if let Some((key, _)) = &winner {
                    to_release.push(*key);
                }
            }

            inner.last_request = pt;
        }

        if !to_release.is_empty() {
            self.release_keys(&to_release);
        }

        match winner {
            Some((pts, payload)) => PictureRead { payload: Some(payload), pts },
            None => PictureRead { payload: None, pts: 0 },
        }
    }

    /// Releases one reference on each of `keys`. Deletes entries whose
    /// refcount reaches zero and notifies waiting writers. Used both by
    /// `nbread` and directly by producers that release their own half
    /// immediately after writing.
    pub fn finished(&self, keys: &[i64]) {
        self.release_keys(keys);
    }

    fn release_keys(&self, keys: &[i64]) {
        let mut deleted_any = false;
        let mut inner = self.inner.borrow_mut();
        for &key in keys {
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.refcount = entry.refcount.saturating_sub(1);
                if entry.refcount == 0 {
                    inner.entries.remove(&key);
                    deleted_any = true;
                }
            }
        }
        if deleted_any {
            let ev = inner.delete_event.clone();
            drop(inner);
            ev.notify();
        }
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether the buffer holds no pictures.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Two-phase: collect keys, then remove, never iterate and erase the
        // same map at once.
        let keys: Vec<i64> = self.entries.keys().copied().collect();
        for key in keys {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn insert_bumps_key_on_collision() {
        let kernel = Kernel::new();
        let buf = PictureBuffer::new(&kernel, 8);
        kernel.spawn("w", {
            let buf = buf.clone();
            async move {
                let k1 = buf.write(vec![1], 1000).await;
                let k2 = buf.write(vec![2], 1000).await;
                assert_eq!(k1, 1000);
                assert_eq!(k2, 1001);
            }
        });
        kernel.run(Duration::from_secs(1));
    }

    #[test]
    fn nbread_picks_newest_candidate_below_pt() {
        let kernel = Kernel::new();
        let buf = PictureBuffer::new(&kernel, 8);
        let picked = Rc::new(RefCell::new(None));
        {
            let buf = buf.clone();
            let picked = picked.clone();
            kernel.spawn("w", async move {
                buf.write(vec![1], 1000).await;
                buf.write(vec![2], 2000).await;
                buf.write(vec![3], 3000).await;
                let result = buf.nbread(2500).await;
                *picked.borrow_mut() = Some((result.pts, result.payload));
            });
        }
        kernel.run(Duration::from_secs(1));
        assert_eq!(picked.borrow().as_ref().unwrap().0, 2000);
        assert_eq!(picked.borrow().as_ref().unwrap().1, Some(vec![2]));
    }

    #[test]
    fn nbread_returns_none_when_nothing_satisfies_window() {
        let kernel = Kernel::new();
        let buf = PictureBuffer::new(&kernel, 8);
        let picked = Rc::new(RefCell::new(None));
        {
            let buf = buf.clone();
            let picked = picked.clone();
            kernel.spawn("w", async move {
                buf.write(vec![1], 5000).await;
                let result = buf.nbread(1000).await;
                *picked.borrow_mut() = Some(result.payload);
            });
        }
        kernel.run(Duration::from_secs(1));
        assert_eq!(*picked.borrow(), Some(None));
    }
}
