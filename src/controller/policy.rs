//! Buffer-switch policies
//!
//! A policy is chosen by value when a session is configured and bound to
//! concrete buffer positions once the driver has created the buffers. The
//! bound form is what the real-time callback matches on.

use crossbeam::utils::CachePadded;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::audio::session::SessionChannels;
use crate::channel::{Channel, Direction};
use crate::error::SessionError;

/// User-supplied switch body
pub type SwitchFn = fn(channels: &SessionChannels, half_index: usize, direct_process: bool);

/// Which buffer of a direction a policy is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// First buffer with both halves addressable
    FirstEnabled,
    /// Buffer for this channel number
    Channel(u32),
}

impl Selector {
    fn resolve(self, channels: &SessionChannels, direction: Direction) -> Result<usize, SessionError> {
        match self {
            Selector::FirstEnabled => channels.first_enabled(direction),
            Selector::Channel(number) => {
                let channel = Channel::new(number, direction);
                let index = channels
                    .position(&channel)
                    .ok_or(SessionError::ChannelNotFound(channel))?;
                if channels.list(direction)[index].is_enabled() {
                    Ok(index)
                } else {
                    Err(SessionError::NoBufferableChannel(direction))
                }
            }
        }
    }
}

/// What happens on every buffer switch
#[derive(Clone, Copy)]
pub enum SwitchPolicy {
    /// Copy the input half to the output half, then queue the input half
    Loopback { input: Selector, output: Selector },
    /// Queue the input half
    CaptureOnly { input: Selector },
    Custom(SwitchFn),
}

impl SwitchPolicy {
    /// Loopback between the first enabled input and output
    pub fn loopback() -> Self {
        SwitchPolicy::Loopback {
            input: Selector::FirstEnabled,
            output: Selector::FirstEnabled,
        }
    }

    /// Capture from the first enabled input
    pub fn capture_only() -> Self {
        SwitchPolicy::CaptureOnly {
            input: Selector::FirstEnabled,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SwitchPolicy::Loopback { .. } => "loopback",
            SwitchPolicy::CaptureOnly { .. } => "capture-only",
            SwitchPolicy::Custom(_) => "custom",
        }
    }

    /// Resolve selectors against freshly created buffers
    pub(crate) fn bind(&self, channels: &SessionChannels) -> Result<BoundPolicy, SessionError> {
        Ok(match *self {
            SwitchPolicy::Loopback { input, output } => BoundPolicy::Loopback {
                input: input.resolve(channels, Direction::Input)?,
                output: output.resolve(channels, Direction::Output)?,
            },
            SwitchPolicy::CaptureOnly { input } => BoundPolicy::CaptureOnly {
                input: input.resolve(channels, Direction::Input)?,
            },
            SwitchPolicy::Custom(f) => BoundPolicy::Custom(f),
        })
    }
}

impl std::fmt::Debug for SwitchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchPolicy::Loopback { input, output } => f
                .debug_struct("Loopback")
                .field("input", input)
                .field("output", output)
                .finish(),
            SwitchPolicy::CaptureOnly { input } => {
                f.debug_struct("CaptureOnly").field("input", input).finish()
            }
            SwitchPolicy::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// A policy wired to buffer positions within one session
#[derive(Clone, Copy)]
pub(crate) enum BoundPolicy {
    Loopback { input: usize, output: usize },
    CaptureOnly { input: usize },
    Custom(SwitchFn),
}

impl BoundPolicy {
    /// Run one switch. Returns false if any step had to be skipped.
    pub fn run(&self, channels: &SessionChannels, half_index: usize, direct_process: bool) -> bool {
        match *self {
            BoundPolicy::Loopback { input, output } => {
                let (Some(input), Some(output)) =
                    (channels.inputs().get(input), channels.outputs().get(output))
                else {
                    return false;
                };
                let copied = input.copy_half_to(output, half_index);
                let stored = input.store_half(half_index);
                copied && stored
            }
            BoundPolicy::CaptureOnly { input } => channels
                .inputs()
                .get(input)
                .is_some_and(|input| input.store_half(half_index)),
            BoundPolicy::Custom(f) => {
                f(channels, half_index, direct_process);
                true
            }
        }
    }
}

/// Counters updated by the switch callback
#[derive(Default)]
pub struct SwitchStats {
    switches: CachePadded<AtomicU64>,
    faults: CachePadded<AtomicU64>,
}

impl SwitchStats {
    pub fn record(&self, completed: bool) {
        self.switches.fetch_add(1, Ordering::Relaxed);
        if !completed {
            self.faults.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> SwitchCounts {
        SwitchCounts {
            switches: self.switches.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`SwitchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SwitchCounts {
    pub switches: u64,
    /// Switches where a copy or store was skipped
    pub faults: u64,
}
