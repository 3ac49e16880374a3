//! Per-channel sample accumulation queue
//!
//! A mutex-guarded FIFO filled by the buffer-switch callback and drained
//! by consumer threads. The lock is held only for the copy in or out of
//! the queue, never across a blocking call.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::Sample;

/// Thread-safe FIFO of samples
pub struct AccumulationQueue {
    samples: Mutex<VecDeque<Sample>>,
    /// Capacity given to the replacement container on `fetch_all`
    reserve: usize,
    stored: AtomicU64,
    fetched: AtomicU64,
}

impl AccumulationQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a queue that keeps room for `reserve` samples after each drain
    pub fn with_capacity(reserve: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(reserve)),
            reserve,
            stored: AtomicU64::new(0),
            fetched: AtomicU64::new(0),
        }
    }

    /// Append samples at the tail
    pub fn store(&self, samples: &[Sample]) {
        self.samples.lock().extend(samples.iter().copied());
        self.stored.fetch_add(samples.len() as u64, Ordering::Relaxed);
    }

    /// Append `count` samples read from an externally owned region
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `count` samples and the region must
    /// not be written for the duration of the call.
    pub unsafe fn store_raw(&self, ptr: *const Sample, count: usize) {
        if ptr.is_null() || count == 0 {
            return;
        }
        // SAFETY: guaranteed by the caller
        self.store(unsafe { std::slice::from_raw_parts(ptr, count) });
    }

    /// Detach everything accumulated so far
    ///
    /// The queue is left empty; the returned vector is independently owned.
    pub fn fetch_all(&self) -> Vec<Sample> {
        let fresh = VecDeque::with_capacity(self.reserve);
        let taken = std::mem::replace(&mut *self.samples.lock(), fresh);
        self.fetched.fetch_add(taken.len() as u64, Ordering::Relaxed);
        Vec::from(taken)
    }

    /// Move up to `dest.len()` samples from the head into `dest`
    ///
    /// Returns the number copied. Slots of `dest` past that count are left
    /// as they were.
    pub fn fetch_into(&self, dest: &mut [Sample]) -> usize {
        let mut samples = self.samples.lock();
        let count = dest.len().min(samples.len());

        let (front, back) = samples.as_slices();
        let from_front = count.min(front.len());
        dest[..from_front].copy_from_slice(&front[..from_front]);
        dest[from_front..count].copy_from_slice(&back[..count - from_front]);
        samples.drain(..count);
        drop(samples);

        self.fetched.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Samples currently queued
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.len(),
            stored: self.stored.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
        }
    }
}

impl Default for AccumulationQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub stored: u64,
    pub fetched: u64,
}

/// Consumer-side handle to a queue
pub type SharedQueue = Arc<AccumulationQueue>;
