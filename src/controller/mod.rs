//! Session controller
//!
//! Drives the lifecycle `Idle -> Armed -> Running -> Stopped -> Idle`
//! around a driver and a [`BufferManager`].

pub mod policy;

use serde::Serialize;
use std::fmt;

use crate::audio::queue::SharedQueue;
use crate::audio::session::{BufferManager, Session};
use crate::channel::{Channel, Direction};
use crate::driver::Driver;
use crate::error::{Result, SessionError};
use crate::Sample;

pub use policy::{Selector, SwitchCounts, SwitchFn, SwitchPolicy};

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// No buffers
    Idle,
    /// Buffers created and policy registered, not streaming
    Armed,
    /// Driver is invoking the switch callback
    Running,
    /// Streaming halted, buffers still allocated
    Stopped,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Armed => "armed",
            State::Running => "running",
            State::Stopped => "stopped",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns a driver and the session running on it
pub struct Controller<D: Driver> {
    // Dropped before the driver so the session is disarmed first
    manager: BufferManager,
    driver: D,
    state: State,
}

impl<D: Driver> Controller<D> {
    /// Wrap `driver` with no buffers created
    pub fn new(driver: D) -> Self {
        Self {
            manager: BufferManager::new(),
            driver,
            state: State::Idle,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// The live session, if buffers exist
    pub fn session(&self) -> Option<&Session> {
        self.manager.session()
    }

    /// Create buffers for `channels` and arm `policy`
    pub fn configure(
        &mut self,
        channels: &[Channel],
        frames: usize,
        policy: SwitchPolicy,
    ) -> std::result::Result<&Session, SessionError> {
        self.expect_state("configure", &[State::Idle])?;

        let session = self.manager.create(&mut self.driver, channels, frames, policy)?;
        self.state = State::Armed;
        tracing::debug!("{}: armed", self.driver.name());
        Ok(session)
    }

    /// [`configure`](Self::configure) with the driver's preferred half-buffer size
    pub fn configure_preferred(&mut self, channels: &[Channel], policy: SwitchPolicy) -> Result<&Session> {
        let frames = self.driver.buffer_size()?.preferred;
        Ok(self.configure(channels, frames, policy)?)
    }

    /// Begin streaming. Also restarts a stopped session.
    pub fn start(&mut self) -> std::result::Result<(), SessionError> {
        self.expect_state("start", &[State::Armed, State::Stopped])?;

        self.driver.start().map_err(|e| {
            tracing::error!("{}: start failed: {}", self.driver.name(), e);
            SessionError::DriverStart(e)
        })?;
        self.state = State::Running;
        tracing::info!("{}: streaming started", self.driver.name());
        Ok(())
    }

    /// Halt streaming
    ///
    /// A callback already executing completes normally; none begins after
    /// this returns.
    pub fn stop(&mut self) -> std::result::Result<(), SessionError> {
        self.expect_state("stop", &[State::Running])?;

        self.driver.stop().map_err(|e| {
            tracing::error!("{}: stop failed: {}", self.driver.name(), e);
            SessionError::DriverStop(e)
        })?;
        self.state = State::Stopped;
        tracing::info!("{}: streaming stopped", self.driver.name());
        Ok(())
    }

    /// Release buffers and return to idle. Stops first if running; a no-op
    /// when already idle.
    ///
    /// On failure the session is disarmed but kept, the state is left as
    /// it was, and `dispose` may be called again.
    pub fn dispose(&mut self) -> std::result::Result<(), SessionError> {
        match self.state {
            State::Idle => return Ok(()),
            State::Running => {
                if let Err(e) = self.stop() {
                    self.manager.disarm();
                    return Err(e);
                }
            }
            State::Armed | State::Stopped => {}
        }

        self.manager.dispose(&mut self.driver)?;
        self.state = State::Idle;
        Ok(())
    }

    /// Drain everything accumulated for input buffer `index`
    ///
    /// Returns an empty vector when no session exists.
    pub fn fetch_input(&self, index: usize) -> std::result::Result<Vec<Sample>, SessionError> {
        match self.manager.session() {
            Some(session) => Ok(session.lookup(Direction::Input, index)?.fetch_all()),
            None => Ok(Vec::new()),
        }
    }

    /// Consumer handle for input buffer `index`
    pub fn input_queue(&self, index: usize) -> std::result::Result<SharedQueue, SessionError> {
        let session = self.manager.session().ok_or(SessionError::InvalidState {
            operation: "get input queue",
            state: State::Idle.as_str(),
        })?;
        Ok(session.lookup(Direction::Input, index)?.queue())
    }

    /// Switch callback counters, zero when idle
    pub fn switch_counts(&self) -> SwitchCounts {
        self.manager
            .session()
            .map(Session::switch_counts)
            .unwrap_or_default()
    }

    fn expect_state(&self, operation: &'static str, allowed: &[State]) -> std::result::Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }
}

impl<D: Driver> Drop for Controller<D> {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            tracing::warn!("Dispose on drop failed: {}", e);
        }
    }
}
