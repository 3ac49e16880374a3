//! Process-wide slot for the armed session
//!
//! The driver's buffer-switch callback carries no context argument, so the
//! session it operates on is published here. At most one session is armed
//! at a time: arming an occupied slot fails instead of overwriting it.

use parking_lot::{const_rwlock, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::session::SessionChannels;
use crate::controller::policy::{BoundPolicy, SwitchStats};
use crate::driver::Callbacks;
use crate::error::SessionError;

static ARMED: RwLock<Option<ArmedSession>> = const_rwlock(None);
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies the session that occupies the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArmToken(u64);

/// Everything the switch callback needs, published on arming
pub(crate) struct ArmedSession {
    pub token: ArmToken,
    pub channels: Arc<SessionChannels>,
    pub policy: BoundPolicy,
    pub stats: Arc<SwitchStats>,
}

impl ArmedSession {
    pub fn new(channels: Arc<SessionChannels>, policy: BoundPolicy, stats: Arc<SwitchStats>) -> Self {
        Self {
            token: ArmToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)),
            channels,
            policy,
            stats,
        }
    }

    fn on_switch(&self, half_index: usize, direct_process: bool) {
        let completed = panic::catch_unwind(AssertUnwindSafe(|| {
            self.policy.run(&self.channels, half_index, direct_process)
        }))
        .unwrap_or(false);

        self.stats.record(completed);
    }
}

/// Publish `session`. Fails if another session is armed.
pub(crate) fn arm(session: ArmedSession) -> Result<ArmToken, SessionError> {
    let mut slot = ARMED.write();
    if slot.is_some() {
        return Err(SessionError::AlreadyArmed);
    }
    let token = session.token;
    *slot = Some(session);
    Ok(token)
}

/// Clear the slot if `token` still owns it
///
/// Waits for an in-flight switch callback to return, so once this
/// returns no callback can observe the session.
pub(crate) fn disarm(token: ArmToken) -> bool {
    let mut slot = ARMED.write();
    if slot.as_ref().is_some_and(|armed| armed.token == token) {
        *slot = None;
        true
    } else {
        false
    }
}

/// Whether any session is currently armed
pub fn is_armed() -> bool {
    ARMED.read().is_some()
}

/// Buffer-switch entry point registered with the driver
///
/// Runs on the driver's real-time thread. Never blocks on the registry:
/// if the slot is being rewritten the switch is skipped.
pub fn buffer_switch(half_index: usize, direct_process: bool) {
    let Some(slot) = ARMED.try_read() else {
        return;
    };
    if let Some(armed) = slot.as_ref() {
        armed.on_switch(half_index, direct_process);
    }
}

/// Sample-rate change notification registered with the driver
pub fn sample_rate_changed(rate: f64) {
    tracing::info!("Driver reported sample rate change to {} Hz", rate);
}

/// Callback table pointing at this registry
pub fn callbacks() -> Callbacks {
    Callbacks {
        buffer_switch,
        sample_rate_changed,
    }
}
