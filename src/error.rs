//! Error types for the buffering subsystem

use thiserror::Error;

use crate::channel::{Channel, Direction};

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the native driver, translated from its result codes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Driver unavailable: {0}")]
    DriverUnavailable(&'static str),

    #[error("Input parameter invalid")]
    InvalidParameter,

    #[error("Hardware is in a bad mode or used in a bad mode")]
    InvalidMode,

    #[error("Hardware is not running when sample position is inquired")]
    SamplePositionNotAdvancing,

    #[error("Sample clock or rate cannot be determined or is not present")]
    ClockUnavailable,

    #[error("Not enough memory for completing the request")]
    OutOfMemory,

    #[error("Sample rate {0} Hz is not supported")]
    SampleRateUnavailable(f64),

    #[error("Driver instance creation failed: {0}")]
    InstanceCreation(String),

    #[error("Unknown driver result code: {0}")]
    Unknown(i32),
}

/// Buffer session and controller errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No bufferable {0} channel")]
    NoBufferableChannel(Direction),

    #[error("{direction} buffer index {index} out of range ({len} buffers)")]
    IndexOutOfRange {
        direction: Direction,
        index: usize,
        len: usize,
    },

    #[error("Channel not found in session: {0}")]
    ChannelNotFound(Channel),

    #[error("Channel requested twice: {0}")]
    DuplicateChannel(Channel),

    #[error("No channels requested")]
    EmptyChannelSet,

    #[error("Invalid half-buffer frame length: {0}")]
    InvalidFrameLength(usize),

    #[error("Buffer creation failed: {0}")]
    BufferCreation(#[source] DriverError),

    #[error("Buffer disposal failed: {0}")]
    BufferDisposal(#[source] DriverError),

    #[error("Driver start failed: {0}")]
    DriverStart(#[source] DriverError),

    #[error("Driver stop failed: {0}")]
    DriverStop(#[source] DriverError),

    #[error("Another session is already armed")]
    AlreadyArmed,

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
