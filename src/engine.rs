//! Session engine
//!
//! Owns the session, the notification sink, the bootstrap sequencer and one
//! [`DeviceTracker`] per role. Every [`SessionEvent`] the event loop receives
//! goes through [`SessionEngine::handle`]; device events reach the trackers
//! only once bootstrap has finished.

use thiserror::Error;
use tracing::{debug, error, info};

use crate::bootstrap::{BootstrapError, BootstrapSequencer, BootstrapState, Step};
use crate::config::Settings;
use crate::notification::NotificationSink;
use crate::presentation::RolePresentationConfig;
use crate::session::{DeviceId, DeviceRole, NO_DEVICE, Session, SessionError, SessionEvent};
use crate::tracker::DeviceTracker;

/// Fatal engine failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("session failure: {0}")]
    Session(#[from] SessionError),

    #[error("session disconnected: {0}")]
    Disconnected(String),
}

/// Device-state synchronization and notification engine
pub struct SessionEngine<S: Session, N: NotificationSink> {
    session: S,
    sink: N,
    bootstrap: BootstrapSequencer,
    output: DeviceTracker,
    input: DeviceTracker,
    shut_down: bool,
}

impl<S: Session, N: NotificationSink> SessionEngine<S, N> {
    #[must_use]
    pub fn new(session: S, sink: N, settings: &Settings) -> Self {
        Self {
            session,
            sink,
            bootstrap: BootstrapSequencer::new(settings.volume_scale),
            output: DeviceTracker::new(
                RolePresentationConfig::for_role(DeviceRole::Output),
                &settings.notification,
            ),
            input: DeviceTracker::new(
                RolePresentationConfig::for_role(DeviceRole::Input),
                &settings.notification,
            ),
            shut_down: false,
        }
    }

    /// Begin the bootstrap sequence
    ///
    /// # Errors
    /// Returns an error if the session cannot be reached.
    pub fn start(&mut self) -> Result<(), EngineError> {
        info!("Attaching to audio session");
        self.bootstrap.start(&mut self.session)?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> BootstrapState {
        self.bootstrap.state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == BootstrapState::Running
    }

    #[must_use]
    pub fn tracker(&self, role: DeviceRole) -> &DeviceTracker {
        match role {
            DeviceRole::Output => &self.output,
            DeviceRole::Input => &self.input,
        }
    }

    /// Backend access for the event loop (feeding raw session messages)
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    #[must_use]
    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Process one session event to completion
    ///
    /// # Errors
    /// Any returned error is fatal: bootstrap failures, unrecoverable query
    /// failures and loss of the session.
    pub fn handle(&mut self, event: SessionEvent) -> Result<(), EngineError> {
        if self.shut_down {
            return Ok(());
        }

        if let SessionEvent::Disconnected { reason } = &event {
            error!("Audio session lost: {}", reason);
            self.bootstrap.abort();
            return Err(EngineError::Disconnected(reason.clone()));
        }

        if self.is_running() {
            return self.dispatch(event);
        }

        match self.bootstrap.on_event(&mut self.session, &event)? {
            Step::WatchInstalled => self.go_live(),
            Step::Advanced | Step::Rejected => Ok(()),
        }
    }

    /// Subscribe, take the initial baseline and enter `Running`
    fn go_live(&mut self) -> Result<(), EngineError> {
        debug!("Subscribing to default and mixer changes");
        self.session.subscribe();

        for role in DeviceRole::ALL {
            let id = self.session.default_device_id(role);
            debug!("Initial default {} device: {}", role, id);
            self.reassign(role, id)?;
        }

        self.bootstrap.mark_running();
        info!(
            "Watching default devices (output {}, input {})",
            self.output.current_id(),
            self.input.current_id()
        );
        Ok(())
    }

    fn dispatch(&mut self, event: SessionEvent) -> Result<(), EngineError> {
        match event {
            SessionEvent::DefaultChanged { role, id } => self.reassign(role, id),
            SessionEvent::PropertyChanged { id } => self.refresh_matching(id),
            other => {
                debug!("Ignoring {:?} while running", other);
                Ok(())
            }
        }
    }

    fn reassign(&mut self, role: DeviceRole, id: DeviceId) -> Result<(), EngineError> {
        let tracker = match role {
            DeviceRole::Output => &mut self.output,
            DeviceRole::Input => &mut self.input,
        };
        tracker.reassign(id, &self.session, &mut self.sink)?;
        Ok(())
    }

    fn refresh_matching(&mut self, id: DeviceId) -> Result<(), EngineError> {
        for tracker in [&mut self.output, &mut self.input] {
            if id != NO_DEVICE && tracker.current_id() == id {
                tracker.refresh(&self.session, &mut self.sink)?;
            }
        }
        Ok(())
    }

    /// Release the session and its subscriptions. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        debug!("Releasing audio session");
        self.session.disconnect();
    }
}

impl<S: Session, N: NotificationSink> Drop for SessionEngine<S, N> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
