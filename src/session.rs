//! Audio session interface
//!
//! The engine never talks to `PipeWire` directly. It drives a [`Session`]
//! (component loading, activation, watch installation) and reads device state
//! through [`DeviceQuery`]. Asynchronous completions and device events come
//! back as [`SessionEvent`]s, delivered one at a time by the event loop.

use thiserror::Error;

/// Numeric object id assigned by the session
pub type DeviceId = u32;

/// Sentinel id meaning "no default device known"
pub const NO_DEVICE: DeviceId = 0;

/// Which kind of default device a tracker follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Output,
    Input,
}

impl DeviceRole {
    pub const ALL: [Self; 2] = [Self::Output, Self::Input];

    /// `PipeWire` `media.class` of nodes that can hold this role
    #[must_use]
    pub const fn media_class(self) -> &'static str {
        match self {
            Self::Output => "Audio/Sink",
            Self::Input => "Audio/Source",
        }
    }

    /// Key in the `default` metadata object naming the current default node
    #[must_use]
    pub const fn metadata_key(self) -> &'static str {
        match self {
            Self::Output => "default.audio.sink",
            Self::Input => "default.audio.source",
        }
    }

    #[must_use]
    pub fn from_media_class(class: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.media_class() == class)
    }
}

impl std::fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Output => f.write_str("output"),
            Self::Input => f.write_str("input"),
        }
    }
}

/// Loadable session capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Resolves the current default node for each role
    DefaultNodes,
    /// Per-device volume/mute query and change notification
    Mixer,
}

impl Component {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DefaultNodes => "default-nodes-api",
            Self::Mixer => "mixer-api",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the mixer maps raw channel volumes to the normalized `volume` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeScale {
    Linear,
    /// Perceptual scale used by desktop volume sliders
    #[default]
    Cubic,
}

impl VolumeScale {
    /// Convert a linear amplitude into this scale
    #[must_use]
    pub fn from_linear(self, linear: f64) -> f64 {
        match self {
            Self::Linear => linear,
            Self::Cubic => linear.cbrt(),
        }
    }
}

/// Device state as reported by the mixer
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub name: Option<String>,
    pub volume: f64,
    pub mute: bool,
}

/// Session failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The object disappeared (or never existed). Expected and recoverable.
    #[error("no device with id {0}")]
    NotFound(DeviceId),

    #[error("could not connect to PipeWire: {0}")]
    Connect(String),

    #[error("component {component} failed: {message}")]
    Component {
        component: Component,
        message: String,
    },

    #[error("could not install object watch: {0}")]
    Watch(String),

    /// Unrecoverable failure talking to the session
    #[error("session transport error: {0}")]
    Transport(String),
}

/// Completions and device events delivered back to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ComponentLoaded {
        component: Component,
        result: Result<(), SessionError>,
    },
    ComponentActivated {
        component: Component,
        result: Result<(), SessionError>,
    },
    WatchInstalled {
        result: Result<(), SessionError>,
    },
    /// The default device for `role` is now `id`
    DefaultChanged { role: DeviceRole, id: DeviceId },
    /// Name, volume or mute of device `id` may have changed
    PropertyChanged { id: DeviceId },
    /// The session went away underneath us
    Disconnected { reason: String },
}

/// Read-only device lookups, borrowed by trackers
pub trait DeviceQuery {
    /// Current name/volume/mute of the device bound to `id`
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no such device exists, any other variant
    /// for unrecoverable failures.
    fn query_device(&self, id: DeviceId) -> Result<DeviceState, SessionError>;

    /// Id of the current default device for `role`, or [`NO_DEVICE`]
    fn default_device_id(&self, role: DeviceRole) -> DeviceId;
}

/// Audio session driven by the bootstrap sequence
///
/// Methods that start asynchronous work return immediately; their outcome
/// arrives later as the matching [`SessionEvent`].
pub trait Session: DeviceQuery {
    /// Restrict discovery to nodes holding `role`. Must precede `connect`.
    fn declare_interest(&mut self, role: DeviceRole);

    /// # Errors
    /// Returns [`SessionError::Connect`] if the session is unreachable.
    fn connect(&mut self) -> Result<(), SessionError>;

    /// Completes with [`SessionEvent::ComponentLoaded`]
    fn load_component(&mut self, component: Component);

    fn set_mixer_scale(&mut self, scale: VolumeScale);

    /// Completes with [`SessionEvent::ComponentActivated`]
    fn activate(&mut self, component: Component);

    /// Completes with [`SessionEvent::WatchInstalled`]
    fn install_watch(&mut self);

    /// Start emitting `DefaultChanged` and `PropertyChanged`
    fn subscribe(&mut self);

    /// Drop subscriptions and release the connection
    fn disconnect(&mut self);
}
