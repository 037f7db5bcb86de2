// SPDX-License-Identifier: GPL-3.0-or-later

//! The lifecycle of the collector service.
//!
//! Startup creates the log directories and opens the log file before the
//! listener is bound, so a service which can't record anything never
//! accepts a connection. Once serving, the process reacts to signals:
//! `SIGHUP` rotates the log file, `SIGINT` and `SIGTERM` stop the service
//! after the in-flight requests are answered.

use crate::config::Main;
use crate::handlers::{self, Acceptance, AppState};
use crate::records::LogSink;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

/// The collector service, ready to serve.
pub struct Daemon {
    port: u16,
    state: AppState,
}

impl Daemon {
    /// Prepare the log directories and open the log file.
    pub fn create(config: &Main) -> Result<Self, DaemonError> {
        ensure_dir(&config.paths.log_dir)?;
        ensure_dir(&config.paths.incoming_dir())?;

        let log_file = config.paths.log_file();
        let sink = LogSink::open(&log_file)
            .map_err(|source| DaemonError::LogFile { path: log_file, source })?;
        let acceptance = Acceptance::new(config.distros.clone(), config.variants.clone())
            .map_err(DaemonError::Pattern)?;
        log::debug!("Accepted distros: {:?}", config.distros);
        log::debug!("Accepted variants: {:?}", config.variants);

        let state = AppState { sink: Arc::new(sink), acceptance: Arc::new(acceptance) };
        Ok(Self { port: config.server_port, state })
    }

    pub fn sink(&self) -> Arc<LogSink> {
        Arc::clone(&self.state.sink)
    }

    /// Bind the configured port on every interface.
    pub async fn bind(&self) -> Result<TcpListener, DaemonError> {
        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        TcpListener::bind(address)
            .await
            .map_err(|source| DaemonError::Bind { address, source })
    }

    /// Serve requests from the listener until the shutdown future completes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), DaemonError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(address) = listener.local_addr() {
            log::info!("Serving requests on {address}");
        }
        let service =
            handlers::router(self.state).into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(DaemonError::Serve)
    }

    /// Serve requests on the configured port until a stop signal arrives.
    pub async fn run(self) -> Result<(), DaemonError> {
        let mut hangup = signal(SignalKind::hangup()).map_err(DaemonError::Signal)?;
        let mut terminate = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
        let mut interrupt = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;

        let listener = self.bind().await?;
        let sink = self.sink();
        let stop = Arc::new(Notify::new());
        let mut server = std::pin::pin!(self.serve(listener, stopped(Arc::clone(&stop))));

        let mut rotation_error = None;
        loop {
            tokio::select! {
                result = &mut server => return result,
                _ = hangup.recv() => {
                    log::info!("Received SIGHUP, rotating log file {}", sink.path().display());
                    if let Err(source) = sink.rotate() {
                        log::error!("Failed to rotate log file: {source}");
                        let path = sink.path().to_path_buf();
                        rotation_error = Some(DaemonError::Rotate { path, source });
                        break;
                    }
                }
                _ = terminate.recv() => {
                    log::info!("Received SIGTERM, stopping");
                    break;
                }
                _ = interrupt.recv() => {
                    log::info!("Received SIGINT, stopping");
                    break;
                }
            }
        }

        stop.notify_one();
        server.await?;
        rotation_error.map_or(Ok(()), Err)
    }
}

async fn stopped(stop: Arc<Notify>) {
    stop.notified().await
}

fn ensure_dir(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::DirBuilderExt;
    log::debug!("Ensure directory {}", path.display());
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .map_err(|source| DaemonError::Directory { path: path.to_path_buf(), source })
}

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("error initializing log directory at {}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error opening log file {}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid version pattern")]
    Pattern(#[source] regex::Error),
    #[error("can't listen on {address}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("can't install signal handler")]
    Signal(#[source] io::Error),
    #[error("error while serving")]
    Serve(#[source] io::Error),
    #[error("error rotating log file {}", path.display())]
    Rotate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
