// SPDX-License-Identifier: GPL-3.0-or-later

//! The HTTP surface of the collector service.
//!
//! - `GET /health` answers when the service is running.
//! - `POST /{distro}/{variant}/{version}` records a submission.
//!
//! A submission is always recorded and answered with `200 OK`, even when it
//! is rejected: the rejection is visible in the log only. The only error the
//! submitter sees is a failure to write the log, so it keeps its report for
//! a later attempt.

use crate::records::{LogSink, Record, Verdict};
use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use regex::Regex;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;

const VERSION_PATTERN: &str = r"^\d\d\.(0[1-9]|1[0-2])$";

/// Bodies above this size are recorded as rejected, without their payload.
pub const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Decides whether a submission is accepted.
#[derive(Debug)]
pub struct Acceptance {
    distros: Vec<String>,
    variants: Vec<String>,
    version: Regex,
}

impl Acceptance {
    pub fn new(distros: Vec<String>, variants: Vec<String>) -> Result<Self, regex::Error> {
        Ok(Self { distros, variants, version: Regex::new(VERSION_PATTERN)? })
    }

    /// Returns the verdict and the payload to record.
    ///
    /// A JSON object is recorded in its compact form, anything else as it was received.
    pub fn classify(
        &self,
        distro: &str,
        variant: &str,
        version: &str,
        body: &[u8],
    ) -> (Verdict, String) {
        let mut verdict = Verdict::Accepted;
        if !self.distros.iter().any(|accepted| accepted == distro) {
            log::debug!("Rejecting unsupported distro: {distro}");
            verdict = Verdict::Rejected;
        }
        if !self.variants.iter().any(|accepted| accepted == variant) {
            log::debug!("Rejecting unsupported variant: {variant}");
            verdict = Verdict::Rejected;
        }
        if !self.version.is_match(version) {
            log::debug!("Rejecting invalid version: {version}");
            verdict = Verdict::Rejected;
        }

        let payload = match serde_json::from_slice::<Map<String, Value>>(body) {
            Ok(object) => Value::Object(object).to_string(),
            Err(error) => {
                log::debug!("Rejecting invalid JSON body: {error}");
                verdict = Verdict::Rejected;
                String::from_utf8_lossy(body).into_owned()
            }
        };
        (verdict, payload)
    }
}

/// The state shared by the handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub sink: Arc<LogSink>,
    pub acceptance: Arc<Acceptance>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health).fallback(method_not_supported))
        .route("/{distro}/{variant}/{version}", post(submit).fallback(method_not_supported))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.to_string())
        .unwrap_or_else(|| String::from("unknown"));
    log::info!("Received request: {} {} from {peer}", request.method(), request.uri().path());
    next.run(request).await
}

async fn health() -> &'static str {
    "Health Check: Service is running\n"
}

async fn method_not_supported() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Method is not supported.\n")
}

async fn submit(
    State(state): State<AppState>,
    Path((distro, variant, version)): Path<(String, String, String)>,
    body: Body,
) -> Response {
    let (verdict, payload) = match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
        Ok(body) => state.acceptance.classify(&distro, &variant, &version, &body),
        Err(error) => {
            log::warn!("Rejecting unreadable body of {distro}/{variant}/{version}: {error}");
            (Verdict::Rejected, String::new())
        }
    };
    let record = Record::new(verdict, &distro, &variant, &version, &payload);

    match state.sink.append(&record) {
        Ok(()) => (StatusCode::OK, "POST request processed\n").into_response(),
        Err(error) => {
            log::error!("Failed to write record to {}: {error}", state.sink.path().display());
            (StatusCode::INTERNAL_SERVER_ERROR, "Error writing record\n").into_response()
        }
    }
}
