// SPDX-License-Identifier: GPL-3.0-or-later

use crate::args::{self, Answer};
use crate::collector::SystemCollector;
use crate::context::Context;
use crate::logging::Verbosity;
use crate::store::{CacheLayout, PendingStore, ReportStore, StoreError};
use crate::submit::retry::{RetryError, RetryPump};
use crate::submit::{Outcome, ReportMode, SubmitOptions, Submission};
use crate::transport::{HttpTransport, TransportError};
use std::io::{self, Write};
use std::process::ExitCode;

/// Represent the modes the application can run in.
///
/// To the user the modes are:
/// - show: print the metrics which would be reported.
/// - send: report or decline without asking.
/// - interactive: show the metrics and ask what to do with them.
/// - service: deliver the report which failed to be sent earlier.
pub enum Mode {
    Show(Submission),
    Send(Submission, Answer),
    Interactive(Submission),
    Service(RetryPump),
}

/// The configured mode, ready to run.
pub struct Application {
    mode: Mode,
    verbosity: Verbosity,
}

impl Application {
    /// Configure the application mode based on the command line arguments.
    ///
    /// Here we are resolving where the reports are stored and creating the
    /// HTTP client. If that fails, we try to return a useful error message.
    pub fn configure(
        context: Context,
        arguments: args::Arguments,
    ) -> Result<Self, ConfigurationError> {
        let verbosity = Verbosity::from_occurrences(arguments.verbose);

        let layout = CacheLayout::resolve(&context, arguments.cache_dir.as_deref())
            .map_err(ConfigurationError::CacheLocation)?;
        log::debug!("Report directory: {}", layout.directory().display());
        let reports = ReportStore::new(layout.clone());
        let pending = PendingStore::new(layout);

        let collector = Box::new(SystemCollector::new(&arguments.root, &context));
        let transport = Box::new(
            HttpTransport::new(arguments.timeout).map_err(ConfigurationError::Transport)?,
        );

        let mode = match arguments.mode {
            args::Mode::Service => {
                log::debug!("Mode: send pending report");
                Mode::Service(RetryPump::new(collector, transport, reports, pending, arguments.url))
            }
            mode => {
                let options = SubmitOptions {
                    base_url: arguments.url,
                    force: arguments.force,
                    on_empty_answer: arguments.on_empty_answer,
                };
                let submission = Submission::new(collector, transport, reports, pending, options);
                match mode {
                    args::Mode::Show => Mode::Show(submission),
                    args::Mode::Send(answer) => Mode::Send(submission, answer),
                    _ => Mode::Interactive(submission),
                }
            }
        };

        Ok(Self { mode, verbosity })
    }

    /// It actually runs the application mode.
    ///
    /// These errors are all run-time errors, the user were passing valid
    /// arguments. They are printed with the name of the program.
    pub fn run(self) -> ExitCode {
        let result = match self.mode {
            Mode::Show(submission) => show(&submission),
            Mode::Send(submission, answer) => {
                let mode = match answer {
                    Answer::Yes => ReportMode::Auto,
                    Answer::No => ReportMode::OptOut,
                };
                submit(&submission, mode)
            }
            Mode::Interactive(submission) => submit(&submission, ReportMode::Interactive),
            Mode::Service(pump) => service(&pump),
        };
        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("{}: {}", env!("CARGO_PKG_NAME"), self.verbosity.format_error(&error));
                ExitCode::FAILURE
            }
        }
    }
}

fn show(submission: &Submission) -> anyhow::Result<()> {
    let data = submission.collect()?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(&data)?;
    writeln!(stdout)?;
    Ok(())
}

fn submit(submission: &Submission, mode: ReportMode) -> anyhow::Result<()> {
    let mut input = io::stdin().lock();
    let mut output = io::stdout().lock();
    match submission.collect_and_send(mode, &mut input, &mut output)? {
        Outcome::Reported(path) => log::info!("Metrics reported, saved in {}", path.display()),
        Outcome::OptedOut(path) => log::info!("Opt out reported, saved in {}", path.display()),
        Outcome::Aborted => log::debug!("Nothing reported"),
    }
    Ok(())
}

fn service(pump: &RetryPump) -> anyhow::Result<()> {
    match pump.run() {
        Ok(path) => {
            log::info!("Pending report delivered, saved in {}", path.display());
            Ok(())
        }
        Err(RetryError::NoPendingReport) => {
            log::info!("No pending report found, nothing to do");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("couldn't get where to save reported metrics on disk")]
    CacheLocation(#[source] StoreError),
    #[error("couldn't prepare the metrics server client")]
    Transport(#[source] TransportError),
}
