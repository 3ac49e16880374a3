//! Channel buffers: a channel's two driver half-buffers plus its queue

use std::ptr::NonNull;
use std::sync::Arc;

use super::queue::{AccumulationQueue, SharedQueue};
use crate::channel::{Channel, Direction};
use crate::driver::BufferInfo;
use crate::Sample;

/// Non-owning references to the two half-buffers the driver allocated
/// for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfBufferPair {
    halves: [Option<NonNull<Sample>>; 2],
}

impl HalfBufferPair {
    pub fn new(halves: [Option<NonNull<Sample>>; 2]) -> Self {
        Self { halves }
    }

    pub fn get(&self, index: usize) -> Option<NonNull<Sample>> {
        self.halves.get(index).copied().flatten()
    }

    pub fn is_complete(&self) -> bool {
        self.halves.iter().all(Option::is_some)
    }
}

/// One channel's slice of a buffer session
///
/// Half-buffer memory belongs to the driver and is valid only while the
/// owning session is alive. A `ChannelBuffer` is only ever reachable by
/// borrowing the session (or through the armed registry entry, which is
/// cleared before the driver frees its buffers).
pub struct ChannelBuffer {
    channel: Channel,
    halves: HalfBufferPair,
    frames: usize,
    queue: SharedQueue,
}

// SAFETY: the half pointers are only dereferenced under the driver's
// double-buffer contract: the driver never touches the half that the
// switch callback is currently processing. The queue is internally locked.
unsafe impl Send for ChannelBuffer {}
unsafe impl Sync for ChannelBuffer {}

impl ChannelBuffer {
    /// Build from a record filled in by the driver
    pub fn from_info(info: &BufferInfo, frames: usize) -> Self {
        Self {
            channel: info.channel,
            halves: HalfBufferPair::new(info.buffers),
            frames,
            queue: Arc::new(AccumulationQueue::with_capacity(frames * 2)),
        }
    }

    /// Channel this buffer was created for
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Driver channel number
    pub fn number(&self) -> u32 {
        self.channel.number
    }

    /// Input or output
    pub fn direction(&self) -> Direction {
        self.channel.direction
    }

    /// Length of each half, in frames
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Raw access to half `index`. The memory belongs to the driver and
    /// must not be freed.
    pub fn half(&self, index: usize) -> Option<NonNull<Sample>> {
        self.halves.get(index)
    }

    /// True iff both halves are addressable
    pub fn is_enabled(&self) -> bool {
        self.halves.is_complete()
    }

    /// Check if this buffer belongs to channel `number`
    pub fn is_channel_number(&self, number: u32) -> bool {
        self.channel.number == number
    }

    /// Compares by channel number only
    pub fn matches_channel(&self, channel: &Channel) -> bool {
        self.is_channel_number(channel.number)
    }

    /// Append samples to the accumulation queue
    pub fn store(&self, samples: &[Sample]) {
        self.queue.store(samples);
    }

    /// Drain everything accumulated so far
    pub fn fetch_all(&self) -> Vec<Sample> {
        self.queue.fetch_all()
    }

    /// Drain up to `dest.len()` samples into `dest`, returning the count
    pub fn fetch_into(&self, dest: &mut [Sample]) -> usize {
        self.queue.fetch_into(dest)
    }

    /// Consumer handle that stays valid after the session is disposed
    pub fn queue(&self) -> SharedQueue {
        self.queue.clone()
    }

    /// Queue half `index` into the accumulation queue. Called from the
    /// buffer-switch callback only.
    pub(crate) fn store_half(&self, index: usize) -> bool {
        match self.half(index) {
            Some(ptr) => {
                // SAFETY: the driver allocated `frames` samples per half and
                // does not write this half during the switch callback
                unsafe { self.queue.store_raw(ptr.as_ptr(), self.frames) };
                true
            }
            None => false,
        }
    }

    /// Copy half `index` of `self` into half `index` of `dest`. Called
    /// from the buffer-switch callback only.
    pub(crate) fn copy_half_to(&self, dest: &ChannelBuffer, index: usize) -> bool {
        if self.frames != dest.frames {
            return false;
        }
        match (self.half(index), dest.half(index)) {
            (Some(src), Some(dst)) if src != dst => {
                // SAFETY: both halves hold `frames` samples, are distinct
                // allocations, and belong to the application for the
                // duration of the switch callback
                unsafe {
                    std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), self.frames);
                }
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for ChannelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBuffer")
            .field("channel", &self.channel)
            .field("enabled", &self.is_enabled())
            .field("frames", &self.frames)
            .field("queued", &self.queue.len())
            .finish()
    }
}
