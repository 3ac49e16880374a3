//! # ASIO Buffers
//!
//! Real-time double-buffer bookkeeping for ASIO-style audio drivers.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        APPLICATION THREADS                           │
//! │                                                                      │
//! │   Controller::configure ──▶ BufferManager::create ──┐                │
//! │   Controller::start / stop / dispose                │                │
//! │                                                     ▼                │
//! │                                     Driver::create_buffers           │
//! │                                     (one call, all channels)         │
//! │                                                     │                │
//! │         ┌───────────────────────────────────────────┘                │
//! │         ▼                                                            │
//! │   ┌─────────────────────────────┐      ┌──────────────────────────┐  │
//! │   │ Session                     │      │ Registry (single slot)   │  │
//! │   │  inputs:  [ChannelBuffer]   │─────▶│  channels + bound policy │  │
//! │   │  outputs: [ChannelBuffer]   │      └────────────┬─────────────┘  │
//! │   └──────────────┬──────────────┘                   │                │
//! │                  │ SharedQueue                      │                │
//! │                  ▼                                  │                │
//! │   consumer: fetch_all / fetch_into                  │                │
//! └─────────────────────────────────────────────────────┼────────────────┘
//!                                                       │
//! ┌─────────────────────────────────────────────────────┼────────────────┐
//! │                     DRIVER REAL-TIME THREAD         ▼                │
//! │                                                                      │
//! │   buffer_switch(half, direct) ──▶ SwitchPolicy                       │
//! │                                    ├─ Loopback:    copy in → out,    │
//! │                                    │               queue input half  │
//! │                                    └─ CaptureOnly: queue input half  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Half-buffer memory belongs to the driver. The accumulation queue lock
//! is the only lock taken on the real-time path; the registry is read
//! with a non-blocking `try_read`.

pub mod audio;
pub mod channel;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;

pub use audio::{AccumulationQueue, BufferManager, ChannelBuffer, Session, SharedQueue};
pub use channel::{Channel, ChannelInfo, ChannelList, Direction};
pub use controller::{Controller, Selector, State, SwitchPolicy};
pub use driver::{Driver, SimulatedDriver, SimulatedDriverConfig};
pub use error::{DriverError, Error, Result, SessionError};

/// Sample format exchanged with the driver
pub type Sample = i32;

/// Application-wide constants
pub mod constants {
    /// Default sample rate
    pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

    /// Default half-buffer length in frames
    pub const DEFAULT_HALF_BUFFER_FRAMES: usize = 256;

    /// Default consumer drain interval
    pub const DEFAULT_FETCH_INTERVAL_MS: u64 = 20;

    /// Config file name inside the platform config directory
    pub const CONFIG_FILE_NAME: &str = "asio-buffers.toml";
}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::{const_mutex, Mutex};

    /// Serialises tests that arm the process-wide registry
    pub static SESSION_LOCK: Mutex<()> = const_mutex(());
}
