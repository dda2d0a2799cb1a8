//! Command-line interface definitions
//!
//! The daemon takes no arguments. Help and version flags are disabled so that
//! every argument, including `--help`, is rejected.

use clap::Parser;

/// wp-notifyd - `WirePlumber` notification daemon
#[derive(Parser, Debug)]
#[command(name = "wp-notifyd")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Args {}

/// Printed before the parse error when arguments are given
pub const USAGE_ERROR: &str = "wp-notifyd takes no arguments.";
