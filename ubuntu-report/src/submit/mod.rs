// SPDX-License-Identifier: GPL-3.0-or-later

//! The module contains the report-once protocol of the client.
//!
//! A submission goes through these steps:
//! - read the identity of the system (mandatory),
//! - refuse to continue when that identity was already reported (unless forced),
//! - collect the metrics and ask the user what to do with them,
//! - deliver the metrics (or the opt-out message) to the server,
//! - record the delivered payload as the report of the identity.
//!
//! When the delivery fails, the payload is staged as the pending report
//! and the `retry` module delivers it later.

pub mod consent;
pub mod retry;

use crate::collector::{Collector, CollectorError, Identity};
use crate::store::{PendingStore, ReportStore, StoreError};
use crate::transport::{Transport, TransportError, UrlError, build_url};
use consent::{Consent, EmptyAnswer};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use thiserror::Error;

/// The payload which declines the collection.
pub const OPT_OUT_PAYLOAD: &[u8] = br#"{"OptOut": true}"#;

/// How the decision about the collected metrics is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Show the metrics and ask the user.
    Interactive,
    /// Send the metrics without asking.
    Auto,
    /// Send the opt-out message without collecting anything.
    OptOut,
}

/// The result of a submission which did not fail.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The metrics were delivered and recorded at the path.
    Reported(PathBuf),
    /// The opt-out message was delivered and recorded at the path.
    OptedOut(PathBuf),
    /// The user quit, nothing was sent or written.
    Aborted,
}

/// Options of a submission.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub base_url: String,
    /// Report again even if the identity was already reported.
    pub force: bool,
    pub on_empty_answer: EmptyAnswer,
}

/// Drives a single submission.
pub struct Submission {
    collector: Box<dyn Collector>,
    transport: Box<dyn Transport>,
    reports: ReportStore,
    pending: PendingStore,
    options: SubmitOptions,
}

impl Submission {
    pub fn new(
        collector: Box<dyn Collector>,
        transport: Box<dyn Transport>,
        reports: ReportStore,
        pending: PendingStore,
        options: SubmitOptions,
    ) -> Self {
        Self { collector, transport, reports, pending, options }
    }

    /// Returns the metrics which would be reported, without sending them.
    pub fn collect(&self) -> Result<Vec<u8>, SubmitError> {
        self.collector.collect().map_err(SubmitError::Collect)
    }

    /// Run the whole protocol in the given mode.
    ///
    /// The input and the output are used only in interactive mode, to show
    /// the collected metrics and to read the answer of the user.
    pub fn collect_and_send(
        &self,
        mode: ReportMode,
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> Result<Outcome, SubmitError> {
        let identity = self.identity()?;

        let payload = match mode {
            ReportMode::OptOut => OPT_OUT_PAYLOAD.to_vec(),
            ReportMode::Auto => self.collect()?,
            ReportMode::Interactive => {
                let data = self.collect()?;
                match self.ask(&data, input, output).map_err(SubmitError::Prompt)? {
                    Consent::Granted => data,
                    Consent::Declined => OPT_OUT_PAYLOAD.to_vec(),
                    Consent::Quit => {
                        log::info!("Quitting without reporting");
                        return Ok(Outcome::Aborted);
                    }
                }
            }
        };

        self.deliver(&identity, &payload)
    }

    /// Send previously collected metrics.
    ///
    /// The data must be a JSON document, typically the output of `collect`.
    pub fn send_report(&self, data: &[u8]) -> Result<Outcome, SubmitError> {
        serde_json::from_slice::<serde_json::Value>(data).map_err(SubmitError::InvalidPayload)?;
        let identity = self.identity()?;
        self.deliver(&identity, data)
    }

    /// Send the opt-out message.
    pub fn send_decline(&self) -> Result<Outcome, SubmitError> {
        let identity = self.identity()?;
        self.deliver(&identity, OPT_OUT_PAYLOAD)
    }

    /// Returns the identity, if it was not reported yet.
    fn identity(&self) -> Result<Identity, SubmitError> {
        let identity = self.collector.identity().map_err(SubmitError::Identity)?;
        log::debug!("Reporting for {identity}");

        if self.reports.exists(&identity) {
            let path = self.reports.path(&identity);
            if !self.options.force {
                return Err(SubmitError::AlreadyReported { path });
            }
            log::info!("Forcing report of {identity}, previous report at {}", path.display());
        }
        Ok(identity)
    }

    fn ask(
        &self,
        data: &[u8],
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> io::Result<Consent> {
        writeln!(
            output,
            "This is the result of hardware and optional installer/upgrader that we collected:"
        )?;
        output.write_all(data)?;
        writeln!(output)?;
        consent::ask(input, output, self.options.on_empty_answer)
    }

    fn deliver(&self, identity: &Identity, payload: &[u8]) -> Result<Outcome, SubmitError> {
        let url = build_url(&self.options.base_url, identity)?;

        if let Err(delivery) = self.transport.send(&url, payload) {
            log::debug!("Delivery to {url} failed: {delivery:?}");
            return match self.pending.write(payload) {
                Ok(()) => Err(SubmitError::Delivery(delivery)),
                Err(source) => Err(SubmitError::Staging { delivery, source }),
            };
        }

        let path = self.reports.write(identity, payload).map_err(SubmitError::Save)?;
        if payload == OPT_OUT_PAYLOAD {
            Ok(Outcome::OptedOut(path))
        } else {
            Ok(Outcome::Reported(path))
        }
    }
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("couldn't get mandatory information")]
    Identity(#[source] CollectorError),
    #[error("couldn't collect system minimal info")]
    Collect(#[source] CollectorError),
    #[error(
        "metrics from this machine have already been reported and can be found in: {}, please use the --force flag if you really want to report them again",
        path.display()
    )]
    AlreadyReported { path: PathBuf },
    #[error("data to send isn't valid json")]
    InvalidPayload(#[source] serde_json::Error),
    #[error("report destination url is invalid")]
    Url(#[from] UrlError),
    #[error(
        "data were not delivered successfully to metrics server, saving for a later automated report"
    )]
    Delivery(#[source] TransportError),
    #[error(
        "data were not delivered successfully to metrics server ({delivery}) and couldn't be saved for a later report"
    )]
    Staging {
        delivery: TransportError,
        #[source]
        source: StoreError,
    },
    #[error("couldn't save reported metrics on disk")]
    Save(#[source] StoreError),
    #[error("couldn't ask for user consent")]
    Prompt(#[source] io::Error),
}
