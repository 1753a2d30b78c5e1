use std::str::FromStr;

use tracing::Level;

use crate::config::LogConfig;

/// Install a global `fmt` subscriber for embedding processes.
///
/// Returns `false` when a global subscriber was already installed, which
/// leaves the existing one in place. An unknown level falls back to `info`.
pub fn init_tracing(config: &LogConfig) -> bool {
    let level = Level::from_str(&config.level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init()
        .is_ok()
}
