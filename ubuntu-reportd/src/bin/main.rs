// SPDX-License-Identifier: GPL-3.0-or-later

use log::LevelFilter;
use std::process::ExitCode;
use ubuntu_report::context::Context;
use ubuntu_report::logging::Verbosity;
use ubuntu_reportd::args::{self, Arguments};
use ubuntu_reportd::config::Loader;
use ubuntu_reportd::server::Daemon;

/// Driver function of the service.
#[tokio::main]
async fn main() -> ExitCode {
    // Parse the command line arguments.
    let matches = args::cli().get_matches();
    let arguments = match Arguments::try_from(matches) {
        Ok(arguments) => arguments,
        Err(error) => return fail(Verbosity::Quiet, &error),
    };
    if arguments.mode == args::Mode::Version {
        println!("{}\t{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let mut verbosity = Verbosity::from_occurrences(arguments.verbose);
    match serve(&arguments, &mut verbosity).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => fail(verbosity, &error),
    }
}

async fn serve(arguments: &Arguments, verbosity: &mut Verbosity) -> anyhow::Result<()> {
    // Load the configuration, the command line can only raise its verbosity.
    let context = Context::capture()?;
    let configuration = Loader::load(&context, &arguments.config)?;
    *verbosity = (*verbosity).max(Verbosity::from_occurrences(configuration.verbosity));

    // Initialize the logging system.
    verbosity.init_logger(LevelFilter::Warn);
    log::info!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    log::debug!("{context}");
    log::info!("{configuration}");

    // Run the service.
    let daemon = Daemon::create(&configuration)?;
    daemon.run().await?;
    log::info!("Service stopped");
    Ok(())
}

fn fail(verbosity: Verbosity, error: &anyhow::Error) -> ExitCode {
    eprintln!("{}: {}", env!("CARGO_PKG_NAME"), verbosity.format_error(error));
    ExitCode::FAILURE
}
