// SPDX-License-Identifier: GPL-3.0-or-later

//! This module contains the command line interface of the application.
//!
//! The command line parsing is implemented using the `clap` library.
//! The module is defining types to represent a structured form of the
//! program invocation. The `Arguments` type is used to represent all
//! possible invocations of the program.

use crate::submit::consent::EmptyAnswer;
use crate::transport::DEFAULT_BASE_URL;
use anyhow::anyhow;
use clap::{ArgAction, ArgMatches, Command, arg, command, value_parser};
use std::path::PathBuf;
use std::time::Duration;

const MODE_SHOW_SUBCOMMAND: &str = "show";
const MODE_SEND_SUBCOMMAND: &str = "send";
const MODE_INTERACTIVE_SUBCOMMAND: &str = "interactive";
const MODE_SERVICE_SUBCOMMAND: &str = "service";
const DEFAULT_TIMEOUT_SECONDS: &str = "30";

/// Represents the command line arguments of the application.
#[derive(Debug, PartialEq)]
pub struct Arguments {
    pub verbose: u8,
    // Base URL of the metrics server.
    pub url: String,
    // Report even if the system was already reported.
    pub force: bool,
    // Deadline of a single delivery attempt.
    pub timeout: Duration,
    pub on_empty_answer: EmptyAnswer,
    // Root of the system to collect from.
    pub root: PathBuf,
    // Cache root which replaces the XDG location.
    pub cache_dir: Option<PathBuf>,
    pub mode: Mode,
}

/// Represents the mode of the application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Print the metrics which would be reported.
    Show,
    /// Report (or decline) without asking.
    Send(Answer),
    /// Show the metrics and ask the user.
    Interactive,
    /// Deliver the pending report, retrying until it succeeds.
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Answer {
    Yes,
    No,
}

impl TryFrom<ArgMatches> for Arguments {
    type Error = anyhow::Error;

    fn try_from(matches: ArgMatches) -> Result<Self, Self::Error> {
        let verbose = matches.get_count("verbose");
        let url = matches
            .get_one::<String>("url")
            .cloned()
            .ok_or_else(|| anyhow!("url is defaulted"))?;
        let force = matches.get_flag("force");
        let timeout = matches
            .get_one::<u64>("timeout")
            .copied()
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow!("timeout is defaulted"))?;
        let on_empty_answer = match matches.get_one::<String>("on-empty-answer").map(String::as_str)
        {
            Some("decline") => EmptyAnswer::Decline,
            _ => EmptyAnswer::Quit,
        };
        let root = matches
            .get_one::<PathBuf>("root")
            .cloned()
            .ok_or_else(|| anyhow!("root is defaulted"))?;
        let cache_dir = matches.get_one::<PathBuf>("cache-dir").cloned();

        let mode = match matches.subcommand() {
            Some((MODE_SHOW_SUBCOMMAND, _)) => Mode::Show,
            Some((MODE_SEND_SUBCOMMAND, send_matches)) => {
                match send_matches.get_one::<String>("ANSWER").map(String::as_str) {
                    Some("yes") => Mode::Send(Answer::Yes),
                    Some("no") => Mode::Send(Answer::No),
                    _ => return Err(anyhow!("answer must be 'yes' or 'no'")),
                }
            }
            Some((MODE_INTERACTIVE_SUBCOMMAND, _)) | None => Mode::Interactive,
            Some((MODE_SERVICE_SUBCOMMAND, _)) => Mode::Service,
            _ => return Err(anyhow!("unrecognized subcommand")),
        };

        Ok(Arguments { verbose, url, force, timeout, on_empty_answer, root, cache_dir, mode })
    }
}

/// Represents the command line interface of the application.
///
/// Without subcommand the application runs interactively.
pub fn cli() -> Command {
    command!()
        .about("Report metrics from your system, on your approval.")
        .subcommand_required(false)
        .args(&[
            arg!(-v --verbose ... "Sets the level of verbosity")
                .action(ArgAction::Count)
                .global(true),
            arg!(-u --url <URL> "Base URL of the metrics server")
                .default_value(DEFAULT_BASE_URL)
                .global(true),
            arg!(-f --force "Collect and report again even if already reported")
                .action(ArgAction::SetTrue)
                .global(true),
            arg!(--timeout <SECONDS> "Deadline of a delivery attempt")
                .value_parser(value_parser!(u64).range(1..))
                .default_value(DEFAULT_TIMEOUT_SECONDS)
                .global(true),
            arg!(--"on-empty-answer" <ACTION> "What an empty answer to the prompt means")
                .value_parser(["quit", "decline"])
                .default_value("quit")
                .global(true),
            arg!(--root <DIR> "Root of the system to collect from")
                .value_parser(value_parser!(PathBuf))
                .default_value("/")
                .hide(true)
                .global(true),
            arg!(--"cache-dir" <DIR> "Cache directory to store the reports in")
                .value_parser(value_parser!(PathBuf))
                .hide(true)
                .global(true),
        ])
        .subcommand(
            Command::new(MODE_SHOW_SUBCOMMAND)
                .about("Show the metrics which would be reported, without sending them"),
        )
        .subcommand(
            Command::new(MODE_SEND_SUBCOMMAND)
                .about("Send the metrics (yes) or the opt-out message (no) without asking")
                .arg(arg!(<ANSWER> "Report or decline").value_parser(["yes", "no"])),
        )
        .subcommand(
            Command::new(MODE_INTERACTIVE_SUBCOMMAND)
                .about("Show the metrics and ask before sending them (default)"),
        )
        .subcommand(
            Command::new(MODE_SERVICE_SUBCOMMAND)
                .about("Send the pending report, retrying until it is delivered")
                .hide(true),
        )
}
