//! In-process driver with software-paced buffer switches
//!
//! Allocates real half-buffers, reports them through [`BufferInfo`] records
//! and, while started, runs a dedicated thread that fills the input half
//! with a continuing ramp and then invokes the registered buffer-switch
//! callback, alternating halves once per period.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{codes, BufferInfo, BufferSizeInfo, Callbacks, Driver, IoChannels, IoLatency};
use crate::channel::{Channel, ChannelInfo};
use crate::error::DriverError;
use crate::Sample;

/// Simulated driver settings
#[derive(Debug, Clone)]
pub struct SimulatedDriverConfig {
    pub name: String,
    pub input_channels: u32,
    pub output_channels: u32,
    pub sample_rate: f64,
    pub supported_rates: Vec<f64>,
    pub buffer_size: BufferSizeInfo,
    /// Frames added on top of the buffer size when reporting latency
    pub safety_offset: usize,
    /// Channels that get no addressable half-buffers
    pub unbufferable: Vec<Channel>,
}

impl Default for SimulatedDriverConfig {
    fn default() -> Self {
        Self {
            name: "Simulated ASIO".to_string(),
            input_channels: 2,
            output_channels: 2,
            sample_rate: 48_000.0,
            supported_rates: vec![44_100.0, 48_000.0, 88_200.0, 96_000.0],
            buffer_size: BufferSizeInfo {
                min: 32,
                max: 4096,
                preferred: 256,
                granularity: -1,
            },
            safety_offset: 32,
            unbufferable: Vec::new(),
        }
    }
}

/// Driver operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateBuffers,
    DisposeBuffers,
    Start,
    Stop,
}

/// One heap-allocated half-buffer
struct Half {
    ptr: NonNull<Sample>,
    len: usize,
}

// SAFETY: the allocation is uniquely owned by `Half`; cross-thread access
// goes through raw pointers under the double-buffer contract.
unsafe impl Send for Half {}

impl Half {
    fn zeroed(len: usize) -> Self {
        let boxed: Box<[Sample]> = vec![0; len].into_boxed_slice();
        let raw = Box::into_raw(boxed) as *mut Sample;
        Self {
            // SAFETY: Box::into_raw never returns null
            ptr: unsafe { NonNull::new_unchecked(raw) },
            len,
        }
    }
}

impl Drop for Half {
    fn drop(&mut self) {
        // SAFETY: reconstructs exactly the box leaked in `zeroed`
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.len,
            )));
        }
    }
}

struct Allocation {
    channel: Channel,
    halves: Option<[Half; 2]>,
}

/// Input half pointers handed to the streaming thread
struct InputHalves(Vec<[NonNull<Sample>; 2]>);

// SAFETY: the allocations outlive the thread; `stop` joins it before
// `dispose_buffers` can free them.
unsafe impl Send for InputHalves {}

/// Software driver used by tests and the monitor binary
pub struct SimulatedDriver {
    config: SimulatedDriverConfig,
    sample_rate: f64,
    frames: usize,
    allocations: Vec<Allocation>,
    callbacks: Option<Callbacks>,
    failures: HashMap<Operation, i32>,
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
    switches: Arc<AtomicU64>,
}

impl SimulatedDriver {
    pub fn new(config: SimulatedDriverConfig) -> Self {
        let sample_rate = config.sample_rate;
        Self {
            config,
            sample_rate,
            frames: 0,
            allocations: Vec::new(),
            callbacks: None,
            failures: HashMap::new(),
            stop_tx: None,
            thread_handle: None,
            switches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make the next call of `operation` fail with a native result code
    pub fn fail_next(&mut self, operation: Operation, code: i32) {
        self.failures.insert(operation, code);
    }

    /// Whether the streaming thread is running
    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Buffer switches issued by the streaming thread
    pub fn switches_issued(&self) -> u64 {
        self.switches.load(Ordering::Relaxed)
    }

    /// Whether buffers are currently allocated
    pub fn has_buffers(&self) -> bool {
        !self.allocations.is_empty()
    }

    /// Fill an input half as the hardware would. Returns false when the
    /// channel has no buffer or `samples` does not match the half length.
    pub fn write_input(&self, number: u32, half: usize, samples: &[Sample]) -> bool {
        match self.half(Channel::input(number), half) {
            Some(h) if h.len == samples.len() => {
                // SAFETY: `h` is a live allocation of exactly `samples.len()` samples
                unsafe {
                    std::ptr::copy_nonoverlapping(samples.as_ptr(), h.ptr.as_ptr(), h.len);
                }
                true
            }
            _ => false,
        }
    }

    /// Read an output half as the hardware would
    pub fn read_output(&self, number: u32, half: usize) -> Option<Vec<Sample>> {
        self.half(Channel::output(number), half).map(|h| {
            // SAFETY: `h` is a live allocation of `h.len` samples
            unsafe { std::slice::from_raw_parts(h.ptr.as_ptr(), h.len).to_vec() }
        })
    }

    fn half(&self, channel: Channel, half: usize) -> Option<&Half> {
        self.allocations
            .iter()
            .find(|a| a.channel == channel)
            .and_then(|a| a.halves.as_ref())
            .and_then(|halves| halves.get(half))
    }

    fn take_failure(&mut self, operation: Operation) -> Result<(), DriverError> {
        match self.failures.remove(&operation) {
            Some(code) => codes::check(code),
            None => Ok(()),
        }
    }

    fn channel_count(&self, channel: Channel) -> u32 {
        if channel.is_input() {
            self.config.input_channels
        } else {
            self.config.output_channels
        }
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate)
    }
}

impl Driver for SimulatedDriver {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn version(&self) -> i32 {
        2
    }

    fn channels(&self) -> Result<IoChannels, DriverError> {
        Ok(IoChannels {
            input: self.config.input_channels,
            output: self.config.output_channels,
        })
    }

    fn channel_info(&self, channel: Channel) -> Result<ChannelInfo, DriverError> {
        if channel.number >= self.channel_count(channel) {
            return Err(DriverError::InvalidParameter);
        }
        let is_active = self.allocations.iter().any(|a| a.channel == channel);
        Ok(ChannelInfo {
            channel,
            name: format!("Simulated {} {}", channel.direction, channel.number + 1),
            group: 0,
            is_active,
        })
    }

    fn latencies(&self) -> Result<IoLatency, DriverError> {
        let frames = if self.frames > 0 {
            self.frames
        } else {
            self.config.buffer_size.preferred
        };
        Ok(IoLatency {
            input: frames + self.config.safety_offset,
            output: frames + self.config.safety_offset,
        })
    }

    fn buffer_size(&self) -> Result<BufferSizeInfo, DriverError> {
        Ok(self.config.buffer_size)
    }

    fn sample_rate(&self) -> Result<f64, DriverError> {
        Ok(self.sample_rate)
    }

    fn can_sample_rate(&self, rate: f64) -> Result<(), DriverError> {
        if self.config.supported_rates.iter().any(|r| (r - rate).abs() < f64::EPSILON) {
            Ok(())
        } else {
            codes::check(codes::NO_CLOCK)
        }
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<(), DriverError> {
        self.can_sample_rate(rate)
            .map_err(|_| DriverError::SampleRateUnavailable(rate))?;
        self.sample_rate = rate;
        if let Some(callbacks) = self.callbacks {
            (callbacks.sample_rate_changed)(rate);
        }
        Ok(())
    }

    fn create_buffers(
        &mut self,
        infos: &mut [BufferInfo],
        frames: usize,
        callbacks: Callbacks,
    ) -> Result<(), DriverError> {
        self.take_failure(Operation::CreateBuffers)?;

        if self.has_buffers() {
            return codes::check(codes::INVALID_MODE);
        }
        if infos.is_empty() || !self.config.buffer_size.accepts(frames) {
            return codes::check(codes::INVALID_PARAMETER);
        }
        if infos.iter().any(|i| i.channel.number >= self.channel_count(i.channel)) {
            return codes::check(codes::INVALID_PARAMETER);
        }

        let allocations: Vec<Allocation> = infos
            .iter()
            .map(|info| Allocation {
                channel: info.channel,
                halves: (!self.config.unbufferable.contains(&info.channel))
                    .then(|| [Half::zeroed(frames), Half::zeroed(frames)]),
            })
            .collect();

        for (info, allocation) in infos.iter_mut().zip(&allocations) {
            info.buffers = match &allocation.halves {
                Some([h0, h1]) => [Some(h0.ptr), Some(h1.ptr)],
                None => [None, None],
            };
        }

        self.allocations = allocations;
        self.frames = frames;
        self.callbacks = Some(callbacks);
        tracing::debug!("{}: created {} buffers of {} frames", self.config.name, infos.len(), frames);
        Ok(())
    }

    fn dispose_buffers(&mut self) -> Result<(), DriverError> {
        self.take_failure(Operation::DisposeBuffers)?;

        if self.is_running() {
            return codes::check(codes::INVALID_MODE);
        }
        self.allocations.clear();
        self.callbacks = None;
        self.frames = 0;
        Ok(())
    }

    fn start(&mut self) -> Result<(), DriverError> {
        self.take_failure(Operation::Start)?;

        if self.is_running() {
            return Ok(());
        }
        let Some(callbacks) = self.callbacks else {
            return codes::check(codes::INVALID_MODE);
        };

        let inputs = InputHalves(
            self.allocations
                .iter()
                .filter(|a| a.channel.is_input())
                .filter_map(|a| a.halves.as_ref())
                .map(|[h0, h1]| [h0.ptr, h1.ptr])
                .collect(),
        );
        let frames = self.frames;
        let period = self.period();
        let switches = self.switches.clone();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("simulated-driver".to_string())
            .spawn(move || {
                let inputs = inputs;
                let mut half = 0usize;
                let mut clock: Sample = 0;
                let mut deadline = Instant::now() + period;

                loop {
                    match stop_rx.recv_deadline(deadline) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    for halves in &inputs.0 {
                        let ptr = halves[half].as_ptr();
                        for i in 0..frames {
                            // SAFETY: each half holds `frames` samples and the
                            // application is not permitted to read this half yet
                            unsafe { ptr.add(i).write(clock.wrapping_add(i as Sample)) };
                        }
                    }
                    clock = clock.wrapping_add(frames as Sample);

                    (callbacks.buffer_switch)(half, false);
                    switches.fetch_add(1, Ordering::Relaxed);

                    half ^= 1;
                    deadline += period;
                }
            })
            .map_err(|e| DriverError::InstanceCreation(e.to_string()))?;

        self.stop_tx = Some(stop_tx);
        self.thread_handle = Some(handle);
        tracing::debug!("{}: streaming every {:?}", self.config.name, period);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.take_failure(Operation::Stop)?;

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for SimulatedDriver {
    fn drop(&mut self) {
        self.failures.clear();
        let _ = self.stop();
    }
}
