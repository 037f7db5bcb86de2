// SPDX-License-Identifier: GPL-3.0-or-later

//! The module contains the log of the received submissions.
//!
//! Every submission becomes one tab separated line:
//!
//! ```text
//! OK|REJ <tab> RFC3339 timestamp <tab> distro <tab> variant <tab> version <tab> JSON
//! ```
//!
//! The file is opened in append mode. Writers and the rotation share one
//! mutex, so a line is never interleaved with another one, and a write
//! never goes into a file which is being closed.

use chrono::{DateTime, Local, SecondsFormat};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The classification of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "OK"),
            Verdict::Rejected => write!(f, "REJ"),
        }
    }
}

/// One line of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub verdict: Verdict,
    pub timestamp: DateTime<Local>,
    pub distro: String,
    pub variant: String,
    pub version: String,
    pub payload: String,
}

impl Record {
    pub fn new(
        verdict: Verdict,
        distro: &str,
        variant: &str,
        version: &str,
        payload: &str,
    ) -> Self {
        Self {
            verdict,
            timestamp: Local::now(),
            distro: field(distro),
            variant: field(variant),
            version: field(version),
            payload: field(payload),
        }
    }
}

// Path parameters are percent decoded and raw bodies are kept as received,
// both may carry the separators.
fn field(value: &str) -> String {
    value.replace(['\n', '\r'], "").replace('\t', " ")
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.verdict,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.distro,
            self.variant,
            self.version,
            self.payload
        )
    }
}

/// The append-only log file, which can be rotated.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogSink {
    /// Open (or create) the log file.
    pub fn open(path: &Path) -> io::Result<Self> {
        let sink = Self { path: path.to_path_buf(), file: Mutex::new(None) };
        sink.rotate()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the current file and open the configured path again.
    ///
    /// An external tool which moved the file away gets the old content,
    /// the new records go to a fresh file. Otherwise the records continue
    /// in the same file.
    pub fn rotate(&self) -> io::Result<()> {
        let mut guard = self.lock();
        if guard.take().is_some() {
            log::debug!("Closing log file {}", self.path.display());
        }
        log::debug!("Opening log file {}", self.path.display());
        *guard = Some(open_append(&self.path)?);
        Ok(())
    }

    /// Write the record as one line.
    pub fn append(&self, record: &Record) -> io::Result<()> {
        let line = format!("{record}\n");
        let mut guard = self.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "log file is not open"))?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(unix)]
fn open_append(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new().create(true).append(true).mode(0o660).open(path)
}

#[cfg(not(unix))]
fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
