//! Buffer session management
//!
//! [`BufferManager`] asks the driver for half-buffers for a set of
//! channels, wraps the result in [`ChannelBuffer`]s partitioned by
//! direction, and publishes them to the registry for the switch callback.

use std::collections::HashSet;
use std::sync::Arc;

use super::buffer::ChannelBuffer;
use super::registry::{self, ArmToken, ArmedSession};
use crate::channel::{Channel, Direction};
use crate::controller::policy::{SwitchCounts, SwitchPolicy, SwitchStats};
use crate::driver::{BufferInfo, Driver};
use crate::error::SessionError;

/// The channel buffers of one session, in creation order
#[derive(Debug)]
pub struct SessionChannels {
    inputs: Vec<ChannelBuffer>,
    outputs: Vec<ChannelBuffer>,
    frames: usize,
}

impl SessionChannels {
    pub(crate) fn new(inputs: Vec<ChannelBuffer>, outputs: Vec<ChannelBuffer>, frames: usize) -> Self {
        Self { inputs, outputs, frames }
    }

    /// Partition driver records by direction, keeping request order
    fn from_infos(infos: &[BufferInfo], frames: usize) -> Self {
        let (inputs, outputs): (Vec<_>, Vec<_>) = infos
            .iter()
            .map(|info| ChannelBuffer::from_info(info, frames))
            .partition(|buffer| buffer.direction().is_input());
        Self::new(inputs, outputs, frames)
    }

    /// Input buffers in request order
    pub fn inputs(&self) -> &[ChannelBuffer] {
        &self.inputs
    }

    /// Output buffers in request order
    pub fn outputs(&self) -> &[ChannelBuffer] {
        &self.outputs
    }

    /// Buffers of one direction
    pub fn list(&self, direction: Direction) -> &[ChannelBuffer] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    /// Half-buffer length in frames
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Total number of channel buffers
    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// Check if the session has no buffers
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer at `index` within `direction`
    pub fn lookup(&self, direction: Direction, index: usize) -> Result<&ChannelBuffer, SessionError> {
        let list = self.list(direction);
        list.get(index).ok_or(SessionError::IndexOutOfRange {
            direction,
            index,
            len: list.len(),
        })
    }

    /// Position of the buffer for `channel` within its direction
    pub fn position(&self, channel: &Channel) -> Option<usize> {
        self.list(channel.direction)
            .iter()
            .position(|buffer| buffer.matches_channel(channel))
    }

    /// Buffer for `channel`, if it was requested
    pub fn find(&self, channel: &Channel) -> Option<&ChannelBuffer> {
        self.position(channel)
            .map(|index| &self.list(channel.direction)[index])
    }

    /// Position of the first enabled buffer of `direction`
    pub fn first_enabled(&self, direction: Direction) -> Result<usize, SessionError> {
        self.list(direction)
            .iter()
            .position(ChannelBuffer::is_enabled)
            .ok_or(SessionError::NoBufferableChannel(direction))
    }
}

/// A created set of channel buffers
///
/// Borrowed from the [`BufferManager`]; disposing the manager's session
/// requires `&mut`, so no buffer reference can outlive it. Dropping a
/// session disarms it.
pub struct Session {
    channels: Arc<SessionChannels>,
    token: ArmToken,
    stats: Arc<SwitchStats>,
}

impl Session {
    /// All channel buffers of the session
    pub fn channels(&self) -> &SessionChannels {
        &self.channels
    }

    /// Input buffers in request order
    pub fn inputs(&self) -> &[ChannelBuffer] {
        self.channels.inputs()
    }

    /// Output buffers in request order
    pub fn outputs(&self) -> &[ChannelBuffer] {
        self.channels.outputs()
    }

    /// Half-buffer length in frames
    pub fn frames(&self) -> usize {
        self.channels.frames()
    }

    /// Total number of channel buffers
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if the session has no buffers
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Buffer at `index` within `direction`
    pub fn lookup(&self, direction: Direction, index: usize) -> Result<&ChannelBuffer, SessionError> {
        self.channels.lookup(direction, index)
    }

    /// Buffer for `channel`, if it was requested
    pub fn find(&self, channel: &Channel) -> Option<&ChannelBuffer> {
        self.channels.find(channel)
    }

    /// First input with both halves addressable, in creation order
    pub fn find_first_enabled_input(&self) -> Result<&ChannelBuffer, SessionError> {
        self.find_first_enabled(Direction::Input)
    }

    /// First output with both halves addressable, in creation order
    pub fn find_first_enabled_output(&self) -> Result<&ChannelBuffer, SessionError> {
        self.find_first_enabled(Direction::Output)
    }

    fn find_first_enabled(&self, direction: Direction) -> Result<&ChannelBuffer, SessionError> {
        let index = self.channels.first_enabled(direction)?;
        Ok(&self.channels.list(direction)[index])
    }

    /// Switch callback counters for this session
    pub fn switch_counts(&self) -> SwitchCounts {
        self.stats.snapshot()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if registry::disarm(self.token) {
            tracing::debug!("Session dropped while armed, disarmed");
        }
    }
}

/// Creates and disposes buffer sessions
#[derive(Default)]
pub struct BufferManager {
    session: Option<Session>,
}

impl BufferManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self { session: None }
    }

    /// The live session, if buffers exist
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Whether buffers are currently held
    pub fn is_created(&self) -> bool {
        self.session.is_some()
    }

    /// Create buffers for all `channels` in one driver call and arm them
    /// with `policy`
    ///
    /// All-or-nothing: on any failure no buffers remain allocated and the
    /// manager stays empty.
    pub fn create<D: Driver + ?Sized>(
        &mut self,
        driver: &mut D,
        channels: &[Channel],
        frames: usize,
        policy: SwitchPolicy,
    ) -> Result<&Session, SessionError> {
        if self.session.is_some() {
            return Err(SessionError::InvalidState {
                operation: "create buffers",
                state: "buffers exist",
            });
        }
        validate_request(channels, frames)?;
        if registry::is_armed() {
            return Err(SessionError::AlreadyArmed);
        }

        let mut infos: Vec<BufferInfo> = channels.iter().copied().map(BufferInfo::new).collect();
        driver
            .create_buffers(&mut infos, frames, registry::callbacks())
            .map_err(|e| {
                tracing::error!("Buffer creation for {} channels failed: {}", channels.len(), e);
                SessionError::BufferCreation(e)
            })?;

        let session_channels = Arc::new(SessionChannels::from_infos(&infos, frames));
        let stats = Arc::new(SwitchStats::default());

        let armed = policy.bind(&session_channels).and_then(|bound| {
            registry::arm(ArmedSession::new(session_channels.clone(), bound, stats.clone()))
        });
        let token = match armed {
            Ok(token) => token,
            Err(e) => {
                drop(session_channels);
                if let Err(dispose_err) = driver.dispose_buffers() {
                    tracing::warn!("Releasing buffers after failed arm: {}", dispose_err);
                }
                return Err(e);
            }
        };

        let enabled = session_channels
            .inputs()
            .iter()
            .chain(session_channels.outputs())
            .filter(|b| b.is_enabled())
            .count();
        tracing::info!(
            "Created {} inputs and {} outputs ({} enabled), {} frames per half, {} policy",
            session_channels.inputs().len(),
            session_channels.outputs().len(),
            enabled,
            frames,
            policy.name()
        );

        Ok(&*self.session.insert(Session {
            channels: session_channels,
            token,
            stats,
        }))
    }

    /// Disarm the session and release the driver's buffers
    ///
    /// A no-op when nothing was created. If the driver fails to release,
    /// the session is kept (disarmed) so the call can be retried.
    pub fn dispose<D: Driver + ?Sized>(&mut self, driver: &mut D) -> Result<(), SessionError> {
        if !self.disarm() {
            return Ok(());
        }

        driver.dispose_buffers().map_err(|e| {
            tracing::error!("Buffer disposal failed: {}", e);
            SessionError::BufferDisposal(e)
        })?;
        self.session = None;
        tracing::info!("Buffers disposed");
        Ok(())
    }

    /// Stop the switch callback from touching this session's buffers
    ///
    /// Returns whether a session exists. The buffers stay allocated.
    pub(crate) fn disarm(&mut self) -> bool {
        match &self.session {
            Some(session) => {
                registry::disarm(session.token);
                true
            }
            None => false,
        }
    }
}

fn validate_request(channels: &[Channel], frames: usize) -> Result<(), SessionError> {
    if channels.is_empty() {
        return Err(SessionError::EmptyChannelSet);
    }
    if frames == 0 {
        return Err(SessionError::InvalidFrameLength(frames));
    }
    let mut seen = HashSet::with_capacity(channels.len());
    for channel in channels {
        if !seen.insert(*channel) {
            return Err(SessionError::DuplicateChannel(*channel));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::simulated::Operation;
    use crate::driver::{codes, SimulatedDriver, SimulatedDriverConfig};
    use crate::test_support::SESSION_LOCK;

    fn driver(unbufferable: Vec<Channel>) -> SimulatedDriver {
        SimulatedDriver::new(SimulatedDriverConfig {
            input_channels: 4,
            output_channels: 4,
            unbufferable,
            ..Default::default()
        })
    }

    #[test]
    fn test_create_partitions_in_request_order() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(Vec::new());
        let mut manager = BufferManager::new();

        let request = [
            Channel::output(2),
            Channel::input(3),
            Channel::input(0),
            Channel::output(0),
            Channel::input(1),
        ];
        let session = manager
            .create(&mut driver, &request, 64, SwitchPolicy::capture_only())
            .unwrap();

        assert_eq!(session.len(), request.len());
        let inputs: Vec<u32> = session.inputs().iter().map(ChannelBuffer::number).collect();
        let outputs: Vec<u32> = session.outputs().iter().map(ChannelBuffer::number).collect();
        assert_eq!(inputs, vec![3, 0, 1]);
        assert_eq!(outputs, vec![2, 0]);
        assert_eq!(session.frames(), 64);
        assert!(registry::is_armed());

        manager.dispose(&mut driver).unwrap();
        assert!(!registry::is_armed());
        assert!(!driver.has_buffers());
    }

    #[test]
    fn test_native_failure_leaves_nothing() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(Vec::new());
        let mut manager = BufferManager::new();
        driver.fail_next(Operation::CreateBuffers, codes::HW_MALFUNCTION);

        let err = manager
            .create(&mut driver, &[Channel::input(0), Channel::output(0)], 64, SwitchPolicy::loopback())
            .err()
            .unwrap();

        assert!(matches!(
            err,
            SessionError::BufferCreation(crate::error::DriverError::DriverUnavailable(_))
        ));
        assert!(manager.session().is_none());
        assert!(!registry::is_armed());
        assert!(!driver.has_buffers());
    }

    #[test]
    fn test_unbindable_policy_releases_buffers() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(vec![Channel::output(0)]);
        let mut manager = BufferManager::new();

        let err = manager
            .create(&mut driver, &[Channel::input(0), Channel::output(0)], 64, SwitchPolicy::loopback())
            .err()
            .unwrap();

        assert!(matches!(err, SessionError::NoBufferableChannel(Direction::Output)));
        assert!(!manager.is_created());
        assert!(!driver.has_buffers());
        assert!(!registry::is_armed());
    }

    #[test]
    fn test_request_validation() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(Vec::new());
        let mut manager = BufferManager::new();

        assert!(matches!(
            manager.create(&mut driver, &[], 64, SwitchPolicy::capture_only()),
            Err(SessionError::EmptyChannelSet)
        ));
        assert!(matches!(
            manager.create(&mut driver, &[Channel::input(0)], 0, SwitchPolicy::capture_only()),
            Err(SessionError::InvalidFrameLength(0))
        ));
        assert!(matches!(
            manager.create(
                &mut driver,
                &[Channel::input(1), Channel::input(1)],
                64,
                SwitchPolicy::capture_only()
            ),
            Err(SessionError::DuplicateChannel(c)) if c == Channel::input(1)
        ));
        assert!(!driver.has_buffers());
    }

    #[test]
    fn test_first_enabled_skips_unbufferable() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(vec![Channel::input(0), Channel::output(1)]);
        let mut manager = BufferManager::new();

        let session = manager
            .create(
                &mut driver,
                &[Channel::input(0), Channel::input(2), Channel::output(1), Channel::output(3)],
                64,
                SwitchPolicy::capture_only(),
            )
            .unwrap();

        assert_eq!(session.find_first_enabled_input().unwrap().number(), 2);
        assert_eq!(session.find_first_enabled_output().unwrap().number(), 3);
        assert!(!session.find(&Channel::input(0)).unwrap().is_enabled());
        assert!(session.find(&Channel::input(1)).is_none());

        manager.dispose(&mut driver).unwrap();
    }

    #[test]
    fn test_no_enabled_channel() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(vec![Channel::output(0)]);
        let mut manager = BufferManager::new();

        let session = manager
            .create(&mut driver, &[Channel::input(0), Channel::output(0)], 64, SwitchPolicy::capture_only())
            .unwrap();

        assert!(matches!(
            session.find_first_enabled_output(),
            Err(SessionError::NoBufferableChannel(Direction::Output))
        ));
        assert!(session.lookup(Direction::Output, 0).unwrap().fetch_all().is_empty());

        manager.dispose(&mut driver).unwrap();
    }

    #[test]
    fn test_lookup_out_of_range() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(Vec::new());
        let mut manager = BufferManager::new();

        let session = manager
            .create(&mut driver, &[Channel::input(0), Channel::input(1)], 64, SwitchPolicy::capture_only())
            .unwrap();

        assert_eq!(session.lookup(Direction::Input, 1).unwrap().number(), 1);
        assert!(matches!(
            session.lookup(Direction::Input, 2),
            Err(SessionError::IndexOutOfRange { direction: Direction::Input, index: 2, len: 2 })
        ));
        assert!(matches!(
            session.lookup(Direction::Output, 0),
            Err(SessionError::IndexOutOfRange { len: 0, .. })
        ));

        manager.dispose(&mut driver).unwrap();
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(Vec::new());
        let mut manager = BufferManager::new();

        assert!(manager.dispose(&mut driver).is_ok());

        manager
            .create(&mut driver, &[Channel::input(0)], 64, SwitchPolicy::capture_only())
            .unwrap();
        assert!(manager.dispose(&mut driver).is_ok());
        assert!(manager.dispose(&mut driver).is_ok());
        assert!(!manager.is_created());
    }

    #[test]
    fn test_second_manager_cannot_arm() {
        let _guard = SESSION_LOCK.lock();
        let mut first_driver = driver(Vec::new());
        let mut second_driver = driver(Vec::new());
        let mut first = BufferManager::new();
        let mut second = BufferManager::new();

        first
            .create(&mut first_driver, &[Channel::input(0)], 64, SwitchPolicy::capture_only())
            .unwrap();
        assert!(matches!(
            second.create(&mut second_driver, &[Channel::input(0)], 64, SwitchPolicy::capture_only()),
            Err(SessionError::AlreadyArmed)
        ));
        assert!(!second_driver.has_buffers());

        // Disposing the idle manager must not disarm the other one
        second.dispose(&mut second_driver).unwrap();
        assert!(registry::is_armed());

        first.dispose(&mut first_driver).unwrap();
        assert!(!registry::is_armed());
    }

    #[test]
    fn test_dropped_manager_disarms() {
        let _guard = SESSION_LOCK.lock();
        let mut fresh_driver = driver(Vec::new());
        let mut driver = driver(Vec::new());
        {
            let mut manager = BufferManager::new();
            manager
                .create(&mut driver, &[Channel::input(0)], 64, SwitchPolicy::capture_only())
                .unwrap();
            assert!(registry::is_armed());
        }
        assert!(!registry::is_armed());

        let mut fresh = BufferManager::new();
        assert!(fresh
            .create(&mut fresh_driver, &[Channel::input(0)], 64, SwitchPolicy::capture_only())
            .is_ok());
        fresh.dispose(&mut fresh_driver).unwrap();
    }

    #[test]
    fn test_failed_disposal_can_be_retried() {
        let _guard = SESSION_LOCK.lock();
        let mut driver = driver(Vec::new());
        let mut manager = BufferManager::new();
        manager
            .create(&mut driver, &[Channel::input(0)], 64, SwitchPolicy::capture_only())
            .unwrap();

        driver.fail_next(Operation::DisposeBuffers, codes::HW_MALFUNCTION);
        assert!(matches!(
            manager.dispose(&mut driver),
            Err(SessionError::BufferDisposal(_))
        ));
        assert!(manager.is_created());
        assert!(driver.has_buffers());
        assert!(!registry::is_armed());

        manager.dispose(&mut driver).unwrap();
        assert!(!manager.is_created());
        assert!(!driver.has_buffers());

        manager
            .create(&mut driver, &[Channel::input(0)], 64, SwitchPolicy::capture_only())
            .unwrap();
        manager.dispose(&mut driver).unwrap();
    }
}
