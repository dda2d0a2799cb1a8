//! `wp-notifyd` - `WirePlumber` notification daemon
//!
//! Shows a desktop notification whenever the default audio output or input
//! changes its volume, its mute state or its name.
//! Uses `PipeWire` native tools (`pw-dump`, `pw-metadata`) to follow the session.
//!
//! # Behavior
//! - Switching the default device is silent; the new device's state becomes the baseline
//! - Output notifications carry a volume-level icon and a progress hint
//! - Input notifications always use the microphone icon
//! - Exits with a non-zero status on any session failure (for the service manager to restart)

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod notification;
pub mod pipewire;
pub mod presentation;
pub mod session;
pub mod tracker;

#[cfg(test)]
mod test_utils;

/// Build-time information (version, git commit)
#[allow(clippy::needless_raw_string_hashes, clippy::doc_markdown)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Re-export commonly used types for convenience
pub use cli::Args;
pub use config::Settings;
pub use engine::{EngineError, SessionEngine};
pub use pipewire::PwSession;
