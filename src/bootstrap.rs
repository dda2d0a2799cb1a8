//! Session bootstrap
//!
//! Brings the session from disconnected to a state where default-device and
//! per-device events are delivered, in a fixed order:
//!
//! 1. declare interest in output and input nodes, then connect
//! 2. load the default-nodes component
//! 3. load the mixer component and set its volume scale
//! 4. activate both components together, waiting for both completions
//! 5. install the object watch
//!
//! Each step is issued only after the previous one completed successfully.
//! The sequence is an explicit state machine fed by [`SessionEvent`]
//! completions; a completion that does not belong to the current step is
//! rejected without changing state.

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::session::{Component, DeviceRole, Session, SessionError, SessionEvent, VolumeScale};

/// Number of components activated concurrently in step 4
const COMPONENT_COUNT: u8 = 2;

/// Lifecycle of the session engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Created,
    Connecting,
    LoadingDefaultNodes,
    LoadingMixer,
    /// `pending == 0` means both components are active and the watch
    /// install is outstanding
    ActivatingComponents { pending: u8 },
    WatchInstalled,
    Running,
    Failed,
}

impl BootstrapState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Failed)
    }
}

/// Fatal bootstrap failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bootstrap failed while {stage}: {source}")]
pub struct BootstrapError {
    pub stage: &'static str,
    #[source]
    pub source: SessionError,
}

/// Result of feeding a completion to the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Completion accepted, waiting for the next one
    Advanced,
    /// Completion did not belong to the current step
    Rejected,
    /// The watch is installed; the engine may go live
    WatchInstalled,
}

/// Ordered, callback-driven session setup
#[derive(Debug)]
pub struct BootstrapSequencer {
    state: BootstrapState,
    volume_scale: VolumeScale,
}

impl BootstrapSequencer {
    #[must_use]
    pub fn new(volume_scale: VolumeScale) -> Self {
        Self {
            state: BootstrapState::Created,
            volume_scale,
        }
    }

    #[must_use]
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Declare interest, connect and issue the first component load
    ///
    /// # Errors
    /// Returns an error if the session cannot be reached or `start` was
    /// already called.
    pub fn start(&mut self, session: &mut impl Session) -> Result<(), BootstrapError> {
        if self.state != BootstrapState::Created {
            return Err(BootstrapError {
                stage: "starting",
                source: SessionError::Transport(format!(
                    "bootstrap already in state {:?}",
                    self.state
                )),
            });
        }

        debug!("Declare interest in sinks and sources");
        for role in DeviceRole::ALL {
            session.declare_interest(role);
        }

        self.state = BootstrapState::Connecting;
        debug!("Connecting to PipeWire...");
        if let Err(e) = session.connect() {
            return Err(self.fail("connecting", e));
        }
        debug!("Connected!");

        self.state = BootstrapState::LoadingDefaultNodes;
        debug!("Loading {}", Component::DefaultNodes);
        session.load_component(Component::DefaultNodes);
        Ok(())
    }

    /// Feed a bootstrap completion
    ///
    /// Device events are not bootstrap completions and are always rejected.
    ///
    /// # Errors
    /// Returns an error (and enters `Failed`) when the completion reports a
    /// failure for the current step.
    pub fn on_event(
        &mut self,
        session: &mut impl Session,
        event: &SessionEvent,
    ) -> Result<Step, BootstrapError> {
        match (self.state, event) {
            (
                BootstrapState::LoadingDefaultNodes,
                SessionEvent::ComponentLoaded {
                    component: Component::DefaultNodes,
                    result,
                },
            ) => {
                if let Err(e) = result {
                    return Err(self.fail("loading default-nodes-api", e.clone()));
                }
                debug!("Loaded {}, loading {}", Component::DefaultNodes, Component::Mixer);
                self.state = BootstrapState::LoadingMixer;
                session.load_component(Component::Mixer);
                Ok(Step::Advanced)
            }

            (
                BootstrapState::LoadingMixer,
                SessionEvent::ComponentLoaded {
                    component: Component::Mixer,
                    result,
                },
            ) => {
                if let Err(e) = result {
                    return Err(self.fail("loading mixer-api", e.clone()));
                }
                debug!("Loaded {}, scale {:?}", Component::Mixer, self.volume_scale);
                session.set_mixer_scale(self.volume_scale);

                self.state = BootstrapState::ActivatingComponents {
                    pending: COMPONENT_COUNT,
                };
                session.activate(Component::DefaultNodes);
                session.activate(Component::Mixer);
                Ok(Step::Advanced)
            }

            (
                BootstrapState::ActivatingComponents { pending },
                SessionEvent::ComponentActivated { component, result },
            ) if pending > 0 => {
                if let Err(e) = result {
                    return Err(self.fail("activating components", e.clone()));
                }
                debug!("Activated {}", component);

                let pending = pending - 1;
                self.state = BootstrapState::ActivatingComponents { pending };
                if pending == 0 {
                    debug!("Installing object watch");
                    session.install_watch();
                }
                Ok(Step::Advanced)
            }

            (
                BootstrapState::ActivatingComponents { pending: 0 },
                SessionEvent::WatchInstalled { result },
            ) => {
                if let Err(e) = result {
                    return Err(self.fail("installing object watch", e.clone()));
                }
                debug!("Object watch installed");
                self.state = BootstrapState::WatchInstalled;
                Ok(Step::WatchInstalled)
            }

            (state, event) => {
                if !matches!(
                    event,
                    SessionEvent::DefaultChanged { .. } | SessionEvent::PropertyChanged { .. }
                ) {
                    warn!("Ignoring {:?} in bootstrap state {:?}", event, state);
                }
                Ok(Step::Rejected)
            }
        }
    }

    /// Enter `Running` once the engine has subscribed and taken its baseline
    pub fn mark_running(&mut self) {
        if self.state == BootstrapState::WatchInstalled {
            self.state = BootstrapState::Running;
        }
    }

    /// Enter `Failed` from any non-terminal state
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = BootstrapState::Failed;
        }
    }

    fn fail(&mut self, stage: &'static str, source: SessionError) -> BootstrapError {
        error!("Bootstrap failed while {}: {}", stage, source);
        self.state = BootstrapState::Failed;
        BootstrapError { stage, source }
    }
}
