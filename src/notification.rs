//! Desktop notifications
//!
//! The engine hands finished [`DeviceNotification`]s to a [`NotificationSink`].
//! [`DesktopNotifier`] delivers them over D-Bus via notify-rust.

use std::collections::HashMap;
use std::time::Duration;

use color_eyre::eyre::{Context, Result};
use notify_rust::{Hint, Notification, Timeout};
use tracing::trace;

use crate::config::NotificationSettings;

/// A fully rendered device notification
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceNotification {
    pub title: &'static str,
    /// Device name (empty when the device exposes none)
    pub body: String,
    pub icon: &'static str,
    /// Volume percentage for the progress indicator (0 when muted)
    pub hint: i32,
    pub timeout: Duration,
    pub transient: bool,
}

/// Fire-and-forget notification delivery
pub trait NotificationSink {
    /// Show a notification
    ///
    /// # Errors
    /// Returns an error if the notification could not be delivered. Callers
    /// log and drop it.
    fn show(&mut self, notification: &DeviceNotification) -> Result<()>;
}

/// notify-rust backed sink
///
/// Each title reuses the id of its previous notification, so a new volume
/// bubble replaces the old one instead of stacking.
pub struct DesktopNotifier {
    app_name: String,
    replace_previous: bool,
    last_ids: HashMap<&'static str, u32>,
}

impl DesktopNotifier {
    #[must_use]
    pub fn new(settings: &NotificationSettings) -> Self {
        Self {
            app_name: settings.app_name.clone(),
            replace_previous: settings.replace_previous,
            last_ids: HashMap::new(),
        }
    }

    fn build(&self, notification: &DeviceNotification) -> Notification {
        let mut builder = Notification::new();
        builder
            .summary(notification.title)
            .body(&notification.body)
            .appname(&self.app_name)
            .icon(notification.icon)
            .timeout(Timeout::Milliseconds(
                u32::try_from(notification.timeout.as_millis()).unwrap_or(u32::MAX),
            ))
            .hint(Hint::Transient(notification.transient))
            .hint(Hint::CustomInt("value".to_string(), notification.hint));

        if self.replace_previous
            && let Some(&id) = self.last_ids.get(notification.title)
        {
            builder.id(id);
        }

        builder
    }
}

impl NotificationSink for DesktopNotifier {
    fn show(&mut self, notification: &DeviceNotification) -> Result<()> {
        let handle = self
            .build(notification)
            .show()
            .context("Failed to show notification")?;

        trace!("Notification '{}' shown with id {}", notification.title, handle.id());
        self.last_ids.insert(notification.title, handle.id());
        Ok(())
    }
}
