//! wp-notifyd binary entry point
//!
//! Rejects any argument, sets up logging and runs the daemon.

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wp_notifyd::{
    built_info,
    cli::{Args, USAGE_ERROR},
    config::Settings,
    daemon,
};

/// Initialize logging
///
/// `RUST_LOG` overrides the default `wp_notifyd=<level>` filter. Logs go to
/// stderr so the service manager's journal picks them up.
fn init_logging(settings: &Settings) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Install color-eyre for panic handling
    color_eyre::install()?;

    if let Err(e) = Args::try_parse() {
        eprintln!("{USAGE_ERROR}");
        eprintln!("{e}");
        std::process::exit(1);
    }

    let settings = Settings::default();
    init_logging(&settings);
    info!(
        "Starting wp-notifyd {} ({})",
        built_info::PKG_VERSION,
        built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown commit")
    );

    daemon::run(settings).await
}
