// CLI module
// Command-line and environment argument parsing

mod args;

pub use args::{BackendType, CliArgs};

use clap::Parser;

/// Parse command-line arguments using clap
///
/// Values not given on the command line are read from the environment
/// (`APP_HOST`, `APP_PORT`, `WALLET_BACKEND`, `DB_URL`, `LOG_FORMAT`) and
/// otherwise take their defaults. On invalid arguments or `--help`, clap
/// prints the message and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
