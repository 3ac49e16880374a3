//! Native driver adapter
//!
//! The [`Driver`] trait is the boundary toward the hardware driver. This
//! crate only calls through it; it implements no protocol toward the
//! device itself. Native result codes are translated into [`DriverError`]
//! by [`codes::check`] at this boundary.

pub mod codes;
pub mod simulated;

use std::ptr::NonNull;

use crate::channel::{Channel, ChannelInfo};
use crate::error::DriverError;
use crate::Sample;

pub use simulated::{SimulatedDriver, SimulatedDriverConfig};

/// Buffer-switch entry point. Takes no context: the callee resolves the
/// armed session through the process-wide registry.
pub type BufferSwitchFn = fn(half_index: usize, direct_process: bool);

/// Sample-rate change notification
pub type SampleRateChangedFn = fn(rate: f64);

/// Callback table handed to the driver at buffer creation
#[derive(Clone, Copy)]
pub struct Callbacks {
    pub buffer_switch: BufferSwitchFn,
    pub sample_rate_changed: SampleRateChangedFn,
}

/// Per-channel record filled in by [`Driver::create_buffers`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub channel: Channel,
    /// Half-buffers owned by the driver, `None` where the driver has no
    /// addressable memory for the channel
    pub buffers: [Option<NonNull<Sample>>; 2],
}

impl BufferInfo {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            buffers: [None, None],
        }
    }
}

/// Input and output latencies in frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct IoLatency {
    pub input: usize,
    pub output: usize,
}

/// Number of input and output channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct IoChannels {
    pub input: u32,
    pub output: u32,
}

/// Half-buffer sizes the driver accepts, in frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BufferSizeInfo {
    pub min: usize,
    pub max: usize,
    pub preferred: usize,
    /// Step between valid sizes; `-1` means powers of two
    pub granularity: i32,
}

impl BufferSizeInfo {
    /// Whether `frames` is a size this driver would accept
    pub fn accepts(&self, frames: usize) -> bool {
        if frames < self.min || frames > self.max {
            return false;
        }
        match self.granularity {
            -1 => frames.is_power_of_two(),
            g if g > 0 => (frames - self.min) % g as usize == 0,
            _ => frames == self.preferred,
        }
    }
}

/// Operations this crate needs from a native driver
pub trait Driver: Send {
    /// Driver display name
    fn name(&self) -> &str;

    /// Driver version as reported by the driver
    fn version(&self) -> i32;

    fn channels(&self) -> Result<IoChannels, DriverError>;

    fn channel_info(&self, channel: Channel) -> Result<ChannelInfo, DriverError>;

    fn latencies(&self) -> Result<IoLatency, DriverError>;

    fn buffer_size(&self) -> Result<BufferSizeInfo, DriverError>;

    fn sample_rate(&self) -> Result<f64, DriverError>;

    /// Succeeds if the hardware can run at `rate`
    fn can_sample_rate(&self, rate: f64) -> Result<(), DriverError>;

    fn set_sample_rate(&mut self, rate: f64) -> Result<(), DriverError>;

    /// Allocate half-buffers for every record in a single call, filling
    /// in each record's `buffers`. All-or-nothing.
    fn create_buffers(
        &mut self,
        infos: &mut [BufferInfo],
        frames: usize,
        callbacks: Callbacks,
    ) -> Result<(), DriverError>;

    fn dispose_buffers(&mut self) -> Result<(), DriverError>;

    fn start(&mut self) -> Result<(), DriverError>;

    /// Halt streaming. No buffer switch begins after this returns.
    fn stop(&mut self) -> Result<(), DriverError>;
}
