//! Channel identity and enumeration
//!
//! A channel is one addressable hardware lane, identified by its
//! direction and its number within that direction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::driver::Driver;
use crate::error::{DriverError, SessionError};

/// Signal direction of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn is_input(self) -> bool {
        self == Direction::Input
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Channel descriptor: unique per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub number: u32,
    pub direction: Direction,
}

impl Channel {
    pub const fn new(number: u32, direction: Direction) -> Self {
        Self { number, direction }
    }

    pub const fn input(number: u32) -> Self {
        Self::new(number, Direction::Input)
    }

    pub const fn output(number: u32) -> Self {
        Self::new(number, Direction::Output)
    }

    pub fn is_input(&self) -> bool {
        self.direction.is_input()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.direction, self.number)
    }
}

/// Channel details as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel: Channel,
    pub name: String,
    pub group: i32,
    pub is_active: bool,
}

/// All channels a driver exposes, split by direction
#[derive(Debug, Clone, Default)]
pub struct ChannelList {
    inputs: Vec<ChannelInfo>,
    outputs: Vec<ChannelInfo>,
}

impl ChannelList {
    /// Query the driver for every input and output channel
    pub fn enumerate<D: Driver + ?Sized>(driver: &D) -> Result<Self, DriverError> {
        let counts = driver.channels()?;

        let inputs = (0..counts.input)
            .map(|n| driver.channel_info(Channel::input(n)))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = (0..counts.output)
            .map(|n| driver.channel_info(Channel::output(n)))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            "Enumerated {} input and {} output channels",
            inputs.len(),
            outputs.len()
        );

        Ok(Self { inputs, outputs })
    }

    /// Input channels in driver order
    pub fn inputs(&self) -> &[ChannelInfo] {
        &self.inputs
    }

    /// Output channels in driver order
    pub fn outputs(&self) -> &[ChannelInfo] {
        &self.outputs
    }

    /// Input channel by position
    pub fn input(&self, index: usize) -> Result<&ChannelInfo, SessionError> {
        Self::at(&self.inputs, Direction::Input, index)
    }

    /// Output channel by position
    pub fn output(&self, index: usize) -> Result<&ChannelInfo, SessionError> {
        Self::at(&self.outputs, Direction::Output, index)
    }

    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn at(list: &[ChannelInfo], direction: Direction, index: usize) -> Result<&ChannelInfo, SessionError> {
        list.get(index).ok_or(SessionError::IndexOutOfRange {
            direction,
            index,
            len: list.len(),
        })
    }
}
