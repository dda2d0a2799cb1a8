#![allow(dead_code)]

//! Test doubles for the session and notification seams

use std::collections::HashMap;

use color_eyre::eyre::{Result, eyre};

use crate::notification::{DeviceNotification, NotificationSink};
use crate::session::{
    Component, DeviceId, DeviceQuery, DeviceRole, DeviceState, NO_DEVICE, Session, SessionError,
    SessionEvent, VolumeScale,
};

/// Request issued to [`MockSession`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    DeclareInterest(DeviceRole),
    Connect,
    Load(Component),
    SetMixerScale(VolumeScale),
    Activate(Component),
    InstallWatch,
    Subscribe,
    Disconnect,
}

/// In-memory session that records every request
///
/// Completions are not generated automatically; tests feed them to the
/// engine in whatever order they want to exercise.
#[derive(Debug, Default)]
pub(crate) struct MockSession {
    pub calls: Vec<Call>,
    pub devices: HashMap<DeviceId, DeviceState>,
    pub defaults: HashMap<DeviceRole, DeviceId>,
    pub connect_error: Option<SessionError>,
    /// Returned by every device query when set
    pub query_error: Option<SessionError>,
}

impl MockSession {
    pub fn set_device(&mut self, id: DeviceId, name: &str, volume: f64, mute: bool) {
        self.devices.insert(
            id,
            DeviceState {
                name: Some(name.to_string()),
                volume,
                mute,
            },
        );
    }

    pub fn set_default(&mut self, role: DeviceRole, id: DeviceId) {
        self.defaults.insert(role, id);
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }
}

impl DeviceQuery for MockSession {
    fn query_device(&self, id: DeviceId) -> Result<DeviceState, SessionError> {
        if let Some(e) = &self.query_error {
            return Err(e.clone());
        }
        self.devices.get(&id).cloned().ok_or(SessionError::NotFound(id))
    }

    fn default_device_id(&self, role: DeviceRole) -> DeviceId {
        self.defaults.get(&role).copied().unwrap_or(NO_DEVICE)
    }
}

impl Session for MockSession {
    fn declare_interest(&mut self, role: DeviceRole) {
        self.calls.push(Call::DeclareInterest(role));
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        self.calls.push(Call::Connect);
        match &self.connect_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn load_component(&mut self, component: Component) {
        self.calls.push(Call::Load(component));
    }

    fn set_mixer_scale(&mut self, scale: VolumeScale) {
        self.calls.push(Call::SetMixerScale(scale));
    }

    fn activate(&mut self, component: Component) {
        self.calls.push(Call::Activate(component));
    }

    fn install_watch(&mut self) {
        self.calls.push(Call::InstallWatch);
    }

    fn subscribe(&mut self) {
        self.calls.push(Call::Subscribe);
    }

    fn disconnect(&mut self) {
        self.calls.push(Call::Disconnect);
    }
}

/// Sink that keeps every notification it was asked to show
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub shown: Vec<DeviceNotification>,
    pub fail: bool,
}

impl NotificationSink for RecordingSink {
    fn show(&mut self, notification: &DeviceNotification) -> Result<()> {
        self.shown.push(notification.clone());
        if self.fail {
            return Err(eyre!("no notification daemon running"));
        }
        Ok(())
    }
}

pub(crate) fn loaded(component: Component) -> SessionEvent {
    SessionEvent::ComponentLoaded {
        component,
        result: Ok(()),
    }
}

pub(crate) fn activated(component: Component) -> SessionEvent {
    SessionEvent::ComponentActivated {
        component,
        result: Ok(()),
    }
}

pub(crate) fn watch_installed() -> SessionEvent {
    SessionEvent::WatchInstalled { result: Ok(()) }
}

/// Completions of a successful bootstrap, in delivery order
pub(crate) fn bootstrap_completions() -> Vec<SessionEvent> {
    vec![
        loaded(Component::DefaultNodes),
        loaded(Component::Mixer),
        activated(Component::Mixer),
        activated(Component::DefaultNodes),
        watch_installed(),
    ]
}
