//! Per-role device tracking
//!
//! A [`DeviceTracker`] follows the current default device of one role. It
//! caches the last observed state and decides whether a refresh is worth a
//! notification.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::NotificationSettings;
use crate::notification::{DeviceNotification, NotificationSink};
use crate::presentation::{RolePresentationConfig, hint_percent};
use crate::session::{DeviceId, DeviceQuery, DeviceRole, NO_DEVICE, SessionError};

/// Last observed state of the device holding a role
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub device_id: DeviceId,
    pub name: Option<String>,
    pub volume: f64,
    pub mute: bool,
    /// At least one successful refresh since `device_id` was assigned
    pub valid: bool,
}

impl DeviceSnapshot {
    /// Fresh, not yet refreshed snapshot for `device_id`
    #[must_use]
    pub fn assigned(device_id: DeviceId) -> Self {
        Self {
            device_id,
            name: None,
            volume: 0.0,
            mute: false,
            valid: false,
        }
    }
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self::assigned(NO_DEVICE)
    }
}

/// What a refresh (or reassignment) did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Reassignment to the same id or to no device
    Ignored,
    /// The device was gone; snapshot untouched
    NotFound,
    /// First successful refresh since assignment, never notified
    Baseline,
    Unchanged,
    /// State changed and a notification was handed to the sink
    Notified,
}

/// Tracks the default device of one role
#[derive(Debug)]
pub struct DeviceTracker {
    config: &'static RolePresentationConfig,
    timeout: Duration,
    transient: bool,
    snapshot: DeviceSnapshot,
}

impl DeviceTracker {
    #[must_use]
    pub fn new(config: &'static RolePresentationConfig, settings: &NotificationSettings) -> Self {
        Self {
            config,
            timeout: settings.timeout,
            transient: settings.transient,
            snapshot: DeviceSnapshot::default(),
        }
    }

    #[must_use]
    pub fn role(&self) -> DeviceRole {
        self.config.role
    }

    #[must_use]
    pub fn current_id(&self) -> DeviceId {
        self.snapshot.device_id
    }

    #[must_use]
    pub fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    /// Follow a new default device
    ///
    /// # Errors
    /// Propagates unrecoverable session errors from the follow-up refresh.
    pub fn reassign(
        &mut self,
        new_id: DeviceId,
        session: &impl DeviceQuery,
        sink: &mut impl NotificationSink,
    ) -> Result<RefreshOutcome, SessionError> {
        if new_id == NO_DEVICE || new_id == self.snapshot.device_id {
            return Ok(RefreshOutcome::Ignored);
        }

        debug!(
            "{}({}): Update id {} -> {}",
            self.role(),
            self.snapshot.device_id,
            self.snapshot.device_id,
            new_id
        );
        self.snapshot = DeviceSnapshot::assigned(new_id);
        self.refresh(session, sink)
    }

    /// Re-read the tracked device and notify if it changed
    ///
    /// # Errors
    /// Returns any session error other than [`SessionError::NotFound`].
    pub fn refresh(
        &mut self,
        session: &impl DeviceQuery,
        sink: &mut impl NotificationSink,
    ) -> Result<RefreshOutcome, SessionError> {
        let id = self.snapshot.device_id;
        debug!("{}({}): Update state", self.role(), id);

        let state = match session.query_device(id) {
            Ok(state) => state,
            Err(SessionError::NotFound(_)) => {
                debug!("{}({}): session did not find any node with this id", self.role(), id);
                return Ok(RefreshOutcome::NotFound);
            }
            Err(e) => return Err(e),
        };

        let snapshot = &mut self.snapshot;
        let mut changed = false;

        if snapshot.name != state.name {
            debug!("{}({}): Updated name to {:?}", self.config.role, id, state.name);
            snapshot.name = state.name;
            changed = true;
        }
        if snapshot.volume != state.volume {
            debug!("{}({}): Updated volume {}", self.config.role, id, state.volume);
            snapshot.volume = state.volume;
            changed = true;
        }
        if snapshot.mute != state.mute {
            debug!("{}({}): Updated mute {}", self.config.role, id, state.mute);
            snapshot.mute = state.mute;
            changed = true;
        }

        let was_valid = snapshot.valid;
        snapshot.valid = true;

        if !was_valid {
            return Ok(RefreshOutcome::Baseline);
        }
        if !changed {
            return Ok(RefreshOutcome::Unchanged);
        }

        let notification = self.notification();
        if let Err(e) = sink.show(&notification) {
            warn!("Could not send notification for {} device: {:#}", self.role(), e);
        }
        Ok(RefreshOutcome::Notified)
    }

    /// Notification for the current snapshot
    #[must_use]
    pub fn notification(&self) -> DeviceNotification {
        let snapshot = &self.snapshot;
        let presentation = self.config.render(snapshot.volume, snapshot.mute);

        DeviceNotification {
            title: presentation.title,
            body: snapshot.name.clone().unwrap_or_default(),
            icon: presentation.icon,
            hint: hint_percent(snapshot.volume, snapshot.mute),
            timeout: self.timeout,
            transient: self.transient,
        }
    }
}
