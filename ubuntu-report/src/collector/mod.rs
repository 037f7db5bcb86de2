// SPDX-License-Identifier: GPL-3.0-or-later

//! The boundary to the metrics collection.
//!
//! The submission logic only needs two things from a collector: the identity
//! of the system (distribution and version) and an opaque JSON payload. The
//! `Collector` trait is that seam; `SystemCollector` is the implementation
//! which reads the running system.

mod os_release;
mod system;

pub use os_release::parse_os_release;
pub use system::SystemCollector;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pair which identifies what a report is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub distro: String,
    pub version: String,
}

impl Identity {
    /// Both parts are mandatory, an identity with an empty part is refused.
    pub fn new(distro: &str, version: &str) -> Result<Self, CollectorError> {
        let distro = distro.trim();
        let version = version.trim();
        if distro.is_empty() || version.is_empty() {
            return Err(CollectorError::MissingIdentity {
                distro: distro.to_string(),
                version: version.to_string(),
            });
        }
        Ok(Self { distro: distro.to_string(), version: version.to_string() })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.distro, self.version)
    }
}

/// Source of the identity and the payload of a report.
pub trait Collector {
    /// Returns the mandatory identity of the system.
    fn identity(&self) -> Result<Identity, CollectorError>;

    /// Returns the collected metrics as a pretty printed JSON document.
    fn collect(&self) -> Result<Vec<u8>, CollectorError>;
}

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("distribution '{distro}' or version '{version}' information missing")]
    MissingIdentity { distro: String, version: String },
    #[error("couldn't open {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("can't be converted to a valid json")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_requires_both_parts() {
        assert!(Identity::new("ubuntu", "22.04").is_ok());
        assert!(matches!(
            Identity::new("", "22.04"),
            Err(CollectorError::MissingIdentity { .. })
        ));
        assert!(matches!(
            Identity::new("ubuntu", "  "),
            Err(CollectorError::MissingIdentity { .. })
        ));
    }

    #[test]
    fn test_identity_display() {
        let identity = Identity::new("ubuntu", "18.04").unwrap();
        assert_eq!(identity.to_string(), "ubuntu 18.04");
    }
}
