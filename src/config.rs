//! Daemon settings
//!
//! There is no configuration file: the daemon always follows the current
//! default output and input. Settings are fixed defaults, and only the log
//! filter can be overridden (through `RUST_LOG`).

use std::time::Duration;

use crate::session::VolumeScale;

/// How long a device notification stays on screen
pub const NOTIFICATION_TIMEOUT_MS: u64 = 1500;

/// Global settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: String,
    pub notification: NotificationSettings,
    /// Scale the mixer reports volumes in
    pub volume_scale: VolumeScale,
}

/// Notification delivery settings
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSettings {
    pub app_name: String,
    pub timeout: Duration,
    /// Ask the notification server not to keep the bubble in its history
    pub transient: bool,
    /// Replace the previous bubble of the same role instead of stacking
    pub replace_previous: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            notification: NotificationSettings::default(),
            volume_scale: VolumeScale::Cubic,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            app_name: "wp-notifyd".to_string(),
            timeout: Duration::from_millis(NOTIFICATION_TIMEOUT_MS),
            transient: true,
            replace_previous: true,
        }
    }
}

impl Settings {
    /// Default `EnvFilter` directive when `RUST_LOG` is not set
    #[must_use]
    pub fn log_filter(&self) -> String {
        format!("wp_notifyd={}", self.log_level)
    }
}

fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) { "debug" } else { "info" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.notification.timeout, Duration::from_millis(1500));
        assert!(settings.notification.transient);
        assert_eq!(settings.volume_scale, VolumeScale::Cubic);
    }

    #[test]
    fn test_log_filter_scoped_to_crate() {
        let settings = Settings {
            log_level: "trace".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.log_filter(), "wp_notifyd=trace");
    }
}
