//! Notification presentation
//!
//! Maps a role's device state to the icon and title shown in the
//! notification, using `FreeDesktop` standard icon names.

use crate::session::DeviceRole;

/// How a role picks its icon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconRule {
    /// Muted icon when muted or silent, otherwise one of three volume levels
    VolumeLevels {
        muted: &'static str,
        levels: [&'static str; 3],
    },
    /// Same icon regardless of volume and mute
    Fixed(&'static str),
}

/// Immutable per-role presentation settings
#[derive(Debug, PartialEq, Eq)]
pub struct RolePresentationConfig {
    pub role: DeviceRole,
    pub title: &'static str,
    pub icon: IconRule,
}

pub static OUTPUT: RolePresentationConfig = RolePresentationConfig {
    role: DeviceRole::Output,
    title: "Output Device",
    icon: IconRule::VolumeLevels {
        muted: "audio-volume-muted",
        levels: ["audio-volume-low", "audio-volume-medium", "audio-volume-high"],
    },
};

// Inputs are not shown muted-vs-active; the microphone icon is deliberate.
pub static INPUT: RolePresentationConfig = RolePresentationConfig {
    role: DeviceRole::Input,
    title: "Input Device",
    icon: IconRule::Fixed("audio-input-microphone"),
};

impl RolePresentationConfig {
    #[must_use]
    pub fn for_role(role: DeviceRole) -> &'static Self {
        match role {
            DeviceRole::Output => &OUTPUT,
            DeviceRole::Input => &INPUT,
        }
    }

    /// Icon and title for the given state
    #[must_use]
    pub fn render(&self, volume: f64, mute: bool) -> Presentation {
        let icon = match self.icon {
            IconRule::VolumeLevels { muted, levels } => {
                if mute || volume == 0.0 {
                    muted
                } else {
                    // Float-to-usize casts saturate, so negative noise lands in bucket 0
                    let index = ((volume * 3.0) as usize).min(levels.len() - 1);
                    levels[index]
                }
            }
            IconRule::Fixed(icon) => icon,
        };

        Presentation {
            icon,
            title: self.title,
        }
    }
}

/// Rendered notification appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub icon: &'static str,
    pub title: &'static str,
}

/// Render `(icon, title)` for a role
#[must_use]
pub fn render(role: DeviceRole, volume: f64, mute: bool) -> Presentation {
    RolePresentationConfig::for_role(role).render(volume, mute)
}

/// Progress-bar hint: 0 when muted, otherwise the rounded percentage
#[must_use]
pub fn hint_percent(volume: f64, mute: bool) -> i32 {
    if mute {
        0
    } else {
        (volume * 100.0).round() as i32
    }
}
