// SPDX-License-Identifier: GPL-3.0-or-later

//! Logging setup shared by the executables.
//!
//! The verbosity flag on the command line sets the level, and `RUST_LOG`
//! can still override it for a finer grained selection.

use log::LevelFilter;

/// The level of details the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Info,
    Debug,
}

impl Verbosity {
    /// Map the number of `-v` flags to a verbosity.
    pub fn from_occurrences(count: u8) -> Self {
        match count {
            0 => Verbosity::Quiet,
            1 => Verbosity::Info,
            _ => Verbosity::Debug,
        }
    }

    /// The log level of the verbosity, `quiet` being the given default.
    pub fn level(&self, quiet: LevelFilter) -> LevelFilter {
        match self {
            Verbosity::Quiet => quiet,
            Verbosity::Info => LevelFilter::Info.max(quiet),
            Verbosity::Debug => LevelFilter::Debug.max(quiet),
        }
    }

    /// Initialize the global logger with the level of the verbosity.
    ///
    /// Calling it more than once keeps the first setup.
    pub fn init_logger(&self, quiet: LevelFilter) {
        let _ = env_logger::Builder::new()
            .filter_level(self.level(quiet))
            .parse_default_env()
            .format_target(false)
            .try_init();
    }

    /// Render an error for the user: the top message, or the whole chain when debugging.
    pub fn format_error(&self, error: &anyhow::Error) -> String {
        match self {
            Verbosity::Debug => format!("{error:?}"),
            _ => format!("{error}"),
        }
    }
}
