//! Daemon mode
//!
//! Runs the main event loop: backend messages are folded into session events
//! and fed to the engine until a signal arrives or the session fails.

use color_eyre::eyre::{Result, WrapErr, eyre};
use sd_notify::NotifyState;
use tokio::signal::{self, unix::SignalKind};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::engine::{EngineError, SessionEngine};
use crate::notification::{DesktopNotifier, NotificationSink};
use crate::pipewire::{PwMessage, PwSession};

/// Run the daemon with the given settings
///
/// Returns `Ok` only after a SIGINT or SIGTERM.
///
/// # Errors
/// Returns an error if bootstrap fails or the session breaks while running.
pub async fn run(settings: Settings) -> Result<()> {
    let (session, mut messages) = PwSession::new();
    let notifier = DesktopNotifier::new(&settings.notification);
    let mut engine = SessionEngine::new(session, notifier, &settings);

    let mut sigterm =
        signal::unix::signal(SignalKind::terminate()).wrap_err("Failed to install SIGTERM handler")?;

    engine.start()?;
    info!("Connected to PipeWire, loading components");

    let mut ready = false;

    // Main event loop
    let result = loop {
        tokio::select! {
            message = messages.recv() => {
                let Some(message) = message else {
                    break Err(eyre!("Session message channel closed"));
                };
                if let Err(e) = pump(&mut engine, message) {
                    break Err(e).wrap_err("PipeWire session failed");
                }
                if !ready && engine.is_running() {
                    ready = true;
                    announce_ready();
                }
            }

            _ = signal::ctrl_c() => {
                info!("Caught SIGINT, shutting down normally.");
                break Ok(());
            }

            _ = sigterm.recv() => {
                info!("Caught SIGTERM, shutting down normally.");
                break Ok(());
            }
        }
    };

    if let Err(e) = sd_notify::notify(false, &[NotifyState::Stopping]) {
        debug!("sd_notify STOPPING failed: {}", e);
    }
    engine.shutdown();
    result
}

/// Hand one backend message to the engine
fn pump<N: NotificationSink>(
    engine: &mut SessionEngine<PwSession, N>,
    message: PwMessage,
) -> Result<(), EngineError> {
    for event in engine.session_mut().absorb(message) {
        engine.handle(event)?;
    }
    Ok(())
}

fn announce_ready() {
    if let Err(e) = sd_notify::notify(false, &[NotifyState::Ready]) {
        warn!("Could not notify service manager: {}", e);
    }
}
