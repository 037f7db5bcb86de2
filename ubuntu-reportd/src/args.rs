// SPDX-License-Identifier: GPL-3.0-or-later

//! This module contains the command line interface of the collector service.

use anyhow::anyhow;
use clap::{ArgAction, ArgMatches, Command, arg, command};

const MODE_VERSION_SUBCOMMAND: &str = "version";

/// Represents the command line arguments of the service.
#[derive(Debug, PartialEq)]
pub struct Arguments {
    // The path of the configuration file.
    pub config: Option<String>,
    pub verbose: u8,
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Receive and record submissions.
    Serve,
    /// Print the version and exit.
    Version,
}

impl TryFrom<ArgMatches> for Arguments {
    type Error = anyhow::Error;

    fn try_from(matches: ArgMatches) -> Result<Self, Self::Error> {
        let config = matches.get_one::<String>("config").map(String::to_string);
        let verbose = matches.get_count("verbose");
        let mode = match matches.subcommand() {
            None => Mode::Serve,
            Some((MODE_VERSION_SUBCOMMAND, _)) => Mode::Version,
            _ => return Err(anyhow!("unrecognized subcommand")),
        };
        Ok(Arguments { config, verbose, mode })
    }
}

/// Represents the command line interface of the service.
pub fn cli() -> Command {
    command!()
        .about("Collector service to receive report data from ubuntu-report.")
        .subcommand_required(false)
        .args(&[
            arg!(-v --verbose ... "Issue INFO (-v) or DEBUG (-vv) output")
                .action(ArgAction::Count)
                .global(true),
            arg!(-c --config <FILE> "Path of the config file").global(true),
        ])
        .subcommand(
            Command::new(MODE_VERSION_SUBCOMMAND).about("Returns version of the service and exits"),
        )
}
