// SPDX-License-Identifier: GPL-3.0-or-later

//! Delivery of the pending report.
//!
//! The pending payload is sent again and again until the server accepts it.
//! Between the attempts the pump waits, starting with 30 seconds and doubling
//! the wait each time, up to 30 minutes. There is no attempt limit: the pump
//! is meant to run as a background service and stops only on success (or
//! when the process is killed).

use crate::collector::{Collector, CollectorError};
use crate::store::{PendingStore, ReportStore, StoreError};
use crate::transport::{Transport, UrlError, build_url};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const INITIAL_WAIT: Duration = Duration::from_secs(30);
pub const MAX_WAIT: Duration = Duration::from_secs(30 * 60);

/// The sequence of waits between failed attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial.min(max), max }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_WAIT, MAX_WAIT)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next;
        self.next = current.checked_mul(2).unwrap_or(self.max).min(self.max);
        Some(current)
    }
}

pub type Sleeper = Box<dyn Fn(Duration)>;

/// Delivers the pending report.
pub struct RetryPump {
    collector: Box<dyn Collector>,
    transport: Box<dyn Transport>,
    reports: ReportStore,
    pending: PendingStore,
    base_url: String,
    backoff: Backoff,
    sleep: Sleeper,
}

impl RetryPump {
    pub fn new(
        collector: Box<dyn Collector>,
        transport: Box<dyn Transport>,
        reports: ReportStore,
        pending: PendingStore,
        base_url: String,
    ) -> Self {
        Self {
            collector,
            transport,
            reports,
            pending,
            base_url,
            backoff: Backoff::default(),
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replace how the pump waits between attempts.
    pub fn with_sleeper(mut self, backoff: Backoff, sleep: Sleeper) -> Self {
        self.backoff = backoff;
        self.sleep = sleep;
        self
    }

    /// Deliver the pending report, and record it as the report of the system.
    ///
    /// Returns the path of the written report.
    pub fn run(&self) -> Result<PathBuf, RetryError> {
        let payload = match self.pending.read() {
            Ok(payload) => payload,
            Err(StoreError::NotFound(_)) => return Err(RetryError::NoPendingReport),
            Err(error) => return Err(RetryError::Store(error)),
        };
        let identity = self.collector.identity().map_err(RetryError::Identity)?;
        let url = build_url(&self.base_url, &identity)?;
        log::debug!("Sending pending report of {identity} to {url}");

        let mut waits = self.backoff.clone();
        let mut attempt = 1;
        while let Err(error) = self.transport.send(&url, &payload) {
            let wait = waits.next().unwrap_or(MAX_WAIT);
            log::warn!(
                "Attempt {attempt}: data were not delivered successfully to metrics server: {error:?}, retrying in {}s",
                wait.as_secs()
            );
            (self.sleep)(wait);
            attempt += 1;
        }
        log::info!("Pending report delivered after {attempt} attempt(s)");

        self.pending.clear().map_err(RetryError::Clear)?;
        self.reports.write(&identity, &payload).map_err(RetryError::Store)
    }
}

#[derive(Error, Debug)]
pub enum RetryError {
    #[error("no pending report found")]
    NoPendingReport,
    #[error("couldn't get mandatory information")]
    Identity(#[source] CollectorError),
    #[error("report destination url is invalid")]
    Url(#[from] UrlError),
    #[error("couldn't access pending or reported metrics")]
    Store(#[source] StoreError),
    #[error("couldn't remove pending report after a successful report")]
    Clear(#[source] StoreError),
}
