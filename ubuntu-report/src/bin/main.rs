// SPDX-License-Identifier: GPL-3.0-or-later

use log::LevelFilter;
use std::env;
use std::process::ExitCode;
use ubuntu_report::logging::Verbosity;
use ubuntu_report::{args, context, modes};

/// Driver function of the application.
fn main() -> anyhow::Result<ExitCode> {
    // Parse the command line arguments.
    let matches = args::cli().get_matches();
    let arguments = args::Arguments::try_from(matches)?;

    // Initialize the logging system.
    let verbosity = Verbosity::from_occurrences(arguments.verbose);
    verbosity.init_logger(LevelFilter::Error);
    // Get the package name and version from Cargo
    let pkg_name = env!("CARGO_PKG_NAME");
    let pkg_version = env!("CARGO_PKG_VERSION");
    log::info!("{pkg_name} v{pkg_version}");
    let os = env::consts::OS;
    let arch = env::consts::ARCH;
    log::debug!("Running on... {os} {arch}");
    log::debug!("{arguments:?}");

    // Capture application context.
    let context = context::Context::capture()?;
    log::debug!("{context}");

    // Run the application.
    let application = match modes::Application::configure(context, arguments) {
        Ok(application) => application,
        Err(error) => {
            eprintln!("{pkg_name}: {}", verbosity.format_error(&error.into()));
            return Ok(ExitCode::FAILURE);
        }
    };
    let result = application.run();
    log::debug!("Exit code: {result:?}");

    Ok(result)
}
