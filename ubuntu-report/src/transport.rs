// SPDX-License-Identifier: GPL-3.0-or-later

//! The module contains the delivery of a report to the metrics server.
//!
//! A report is delivered with an HTTP POST to `<base>/<distro>/desktop/<version>`
//! carrying the JSON payload. Delivery is successful only if the server
//! answers with `200 OK`. Every other outcome (refused connection, DNS
//! failure, timeout, other status) is a failure, and the caller handles them
//! all the same way.

use crate::collector::Identity;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// The default metrics server.
pub const DEFAULT_BASE_URL: &str = "https://metrics.ubuntu.com";
/// The default deadline of a single delivery attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const VARIANT: &str = "desktop";

/// Build the destination of a report from the base URL and the identity.
pub fn build_url(base: &str, identity: &Identity) -> Result<Url, UrlError> {
    let mut url =
        Url::parse(base).map_err(|source| UrlError::Parse { base: base.to_string(), source })?;
    {
        let mut segments =
            url.path_segments_mut().map_err(|_| UrlError::CannotBeABase(base.to_string()))?;
        segments.pop_if_empty().extend([
            identity.distro.as_str(),
            VARIANT,
            identity.version.as_str(),
        ]);
    }
    Ok(url)
}

/// Delivers a payload to a URL.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn send(&self, url: &Url, payload: &[u8]) -> Result<(), TransportError>;
}

/// Transport over HTTP(S).
///
/// The client is built once with its timeout policy, so a server which
/// never answers does not hang the caller: the request is aborted and the
/// connection dropped when the deadline passes.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: &Url, payload: &[u8]) -> Result<(), TransportError> {
        log::debug!("Sending {} to {url}", String::from_utf8_lossy(payload));
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .map_err(TransportError::Request)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::Status(status));
        }
        response.bytes().map_err(TransportError::Request)?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum UrlError {
    #[error("invalid base URL: {base}")]
    Parse {
        base: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base URL can't have path segments: {0}")]
    CannotBeABase(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("couldn't create http client")]
    Client(#[source] reqwest::Error),
    #[error("couldn't send post http request")]
    Request(#[source] reqwest::Error),
    #[error("incorrect status code received: {0}")]
    Status(StatusCode),
}
