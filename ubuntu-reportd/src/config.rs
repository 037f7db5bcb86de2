// SPDX-License-Identifier: GPL-3.0-or-later

//! This module defines the configuration of the collector service.
//!
//! The configuration is a YAML file, every field of it is optional:
//!
//! ```yaml
//! verbosity: 0
//! paths:
//!   log_dir: /var/log/ubuntu-reportd
//! server_port: 8080
//! distros: [ubuntu]
//! variants: [desktop]
//! ```
//!
//! The records are written into the `incoming` directory of `log_dir`.
//! Submissions for distributions or variants which are not listed are
//! still recorded, but marked as rejected.

pub use loader::{ConfigError, Loader};
pub use types::*;

mod types {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::path::PathBuf;

    const INCOMING_DIR: &str = "incoming";
    const LOG_FILE: &str = "metrics.log";

    /// Represents the service configuration.
    ///
    /// Unknown keys are an error, so a misspelled key doesn't silently fall back to a default.
    /// The keys of the earlier deployments (`serverport`, `paths.logdir`) are accepted too.
    #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
    #[serde(deny_unknown_fields)]
    pub struct Main {
        #[serde(default)]
        pub verbosity: u8,
        #[serde(default)]
        pub paths: Paths,
        #[serde(default = "default_server_port", alias = "serverport", alias = "ServerPort")]
        pub server_port: u16,
        #[serde(default = "default_distros")]
        pub distros: Vec<String>,
        #[serde(default = "default_variants")]
        pub variants: Vec<String>,
    }

    impl Default for Main {
        fn default() -> Self {
            Self {
                verbosity: 0,
                paths: Paths::default(),
                server_port: default_server_port(),
                distros: default_distros(),
                variants: default_variants(),
            }
        }
    }

    impl fmt::Display for Main {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "Configuration:")?;
            let yaml_string = serde_yml::to_string(self).map_err(|_| fmt::Error)?;
            for line in yaml_string.lines() {
                writeln!(f, "{}", line)?;
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
    #[serde(deny_unknown_fields)]
    pub struct Paths {
        #[serde(default = "default_log_dir", alias = "logdir", alias = "LogDir")]
        pub log_dir: PathBuf,
    }

    impl Default for Paths {
        fn default() -> Self {
            Self { log_dir: default_log_dir() }
        }
    }

    impl Paths {
        /// The directory where the records are written.
        pub fn incoming_dir(&self) -> PathBuf {
            self.log_dir.join(INCOMING_DIR)
        }

        /// The file where the records are written.
        pub fn log_file(&self) -> PathBuf {
            self.incoming_dir().join(LOG_FILE)
        }
    }

    fn default_server_port() -> u16 {
        8080
    }

    fn default_distros() -> Vec<String> {
        vec![String::from("ubuntu")]
    }

    fn default_variants() -> Vec<String> {
        vec![String::from("desktop")]
    }

    fn default_log_dir() -> PathBuf {
        PathBuf::from("/var/log/ubuntu-reportd")
    }
}

pub mod loader {
    use super::Main;
    use directories::BaseDirs;
    use log::{debug, info};
    use std::fs::OpenOptions;
    use std::path::{Path, PathBuf};
    use thiserror::Error;
    use ubuntu_report::context::Context;

    const CONFIG_FILE: &str = "ubuntu-reportd.yaml";
    const SYSTEM_CONFIG_DIR: &str = "/etc/ubuntu-report";

    pub struct Loader {}

    impl Loader {
        /// Loads the configuration from the specified file or the default locations.
        ///
        /// If the configuration file is specified, it must exist. Otherwise, the
        /// default locations are searched for the configuration file, and the
        /// default configuration is returned when none of them exists.
        pub fn load(context: &Context, filename: &Option<String>) -> Result<Main, ConfigError> {
            if let Some(path) = filename {
                Self::from_file(Path::new(path))
            } else {
                for location in Self::file_locations(context) {
                    debug!("Checking configuration file: {}", location.display());
                    if location.exists() {
                        return Self::from_file(location.as_path());
                    }
                }
                debug!("Configuration file not found. Using the default configuration.");
                Ok(Main::default())
            }
        }

        /// The default locations where the configuration file can be found.
        ///
        /// The locations are searched in the following order:
        /// - The current working directory.
        /// - The configuration directory of the user.
        /// - The system configuration directory.
        /// - The directory of the executable.
        fn file_locations(context: &Context) -> Vec<PathBuf> {
            let mut locations = vec![context.current_directory.clone()];
            if let Some(base_dirs) = BaseDirs::new() {
                locations.push(base_dirs.config_dir().to_path_buf());
            }
            locations.push(PathBuf::from(SYSTEM_CONFIG_DIR));
            if let Some(directory) = context.current_executable.parent() {
                locations.push(directory.to_path_buf());
            }
            locations.dedup();
            locations.iter().map(|p| p.join(CONFIG_FILE)).collect()
        }

        /// Loads the configuration from the specified file.
        pub fn from_file(path: &Path) -> Result<Main, ConfigError> {
            info!("Loading configuration file: {}", path.display());

            let reader = OpenOptions::new()
                .read(true)
                .open(path)
                .map_err(|source| ConfigError::FileAccess { path: path.to_path_buf(), source })?;

            let content: Main = Self::from_reader(reader)
                .map_err(|source| ConfigError::ParseError { path: path.to_path_buf(), source })?;

            Self::validate(&content)
                .map_err(|message| ConfigError::ValidationError { path: path.to_path_buf(), message })?;

            Ok(content)
        }

        /// Define the deserialization format of the config file.
        fn from_reader<R, T>(rdr: R) -> serde_yml::Result<T>
        where
            R: std::io::Read,
            T: serde::de::DeserializeOwned,
        {
            serde_yml::from_reader(rdr)
        }

        fn validate(config: &Main) -> Result<(), String> {
            if config.paths.log_dir.as_os_str().is_empty() {
                return Err(String::from("log directory can't be empty"));
            }
            if config.distros.iter().chain(config.variants.iter()).any(|name| name.is_empty()) {
                return Err(String::from("accepted distros and variants can't be empty names"));
            }
            if config.distros.iter().chain(config.variants.iter()).any(|name| name.contains('/')) {
                return Err(String::from("accepted distros and variants can't contain '/'"));
            }
            Ok(())
        }
    }

    /// Represents all possible configuration-related errors.
    #[derive(Debug, Error)]
    pub enum ConfigError {
        /// Error when opening or reading a configuration file.
        #[error("Failed to access configuration file '{}'", path.display())]
        FileAccess {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        /// Error when parsing the configuration file format.
        #[error("Failed to parse configuration from file '{}'", path.display())]
        ParseError {
            path: PathBuf,
            #[source]
            source: serde_yml::Error,
        },
        /// Error when configuration validation fails.
        #[error("Configuration validation failed for '{}': {message}", path.display())]
        ValidationError { path: PathBuf, message: String },
    }

    #[cfg(test)]
    mod test {
        use super::super::*;
        use super::*;
        use std::collections::HashMap;
        use std::fs;

        #[test]
        fn test_full_config() {
            let content: &[u8] = br#"
            verbosity: 2
            paths:
              log_dir: /srv/reports
            server_port: 9090
            distros: [ubuntu, kubuntu]
            variants: [desktop, server]
            "#;

            let result: Main = Loader::from_reader(content).unwrap();

            let expected = Main {
                verbosity: 2,
                paths: Paths { log_dir: PathBuf::from("/srv/reports") },
                server_port: 9090,
                distros: vec!["ubuntu".into(), "kubuntu".into()],
                variants: vec!["desktop".into(), "server".into()],
            };
            assert_eq!(result, expected);
        }

        #[test]
        fn test_partial_config_uses_defaults() {
            let content: &[u8] = br#"
            server_port: 1234
            "#;

            let result: Main = Loader::from_reader(content).unwrap();

            assert_eq!(result, Main { server_port: 1234, ..Main::default() });
        }

        #[test]
        fn test_defaults() {
            let config = Main::default();

            assert_eq!(config.server_port, 8080);
            assert_eq!(config.distros, vec!["ubuntu".to_string()]);
            assert_eq!(config.variants, vec!["desktop".to_string()]);
            assert_eq!(
                config.paths.log_file(),
                PathBuf::from("/var/log/ubuntu-reportd/incoming/metrics.log")
            );
        }

        #[test]
        fn test_invalid_config() {
            let content: &[u8] = br#"
            server_port: not-a-number
            "#;

            let result: serde_yml::Result<Main> = Loader::from_reader(content);
            assert!(result.is_err());
        }

        #[test]
        fn test_earlier_deployment_keys() {
            let content: &[u8] = br#"
            serverport: 9090
            paths:
              logdir: /srv/reports
            "#;

            let result: Main = Loader::from_reader(content).unwrap();

            assert_eq!(result.server_port, 9090);
            assert_eq!(result.paths.log_dir, PathBuf::from("/srv/reports"));
        }

        #[test]
        fn test_unknown_keys_are_rejected() {
            let misspelled: &[u8] = b"server-port: 9090\n";
            let result: serde_yml::Result<Main> = Loader::from_reader(misspelled);
            assert!(result.is_err());

            let nested: &[u8] = b"paths:\n  logs: /srv/reports\n";
            let result: serde_yml::Result<Main> = Loader::from_reader(nested);
            assert!(result.is_err());
        }

        #[test]
        fn test_validation() {
            let temp = tempfile::tempdir().unwrap();
            let path = temp.path().join("config.yaml");
            fs::write(&path, "distros: ['']\n").unwrap();

            let result = Loader::from_file(&path);
            assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
        }

        #[test]
        fn test_load_explicit_missing_file() {
            let context = Context::from_environment(HashMap::new());
            let result = Loader::load(&context, &Some("/nonexistent/ubuntu-reportd.yaml".into()));

            assert!(matches!(result, Err(ConfigError::FileAccess { .. })));
        }

        #[test]
        fn test_load_from_current_directory() {
            let temp = tempfile::tempdir().unwrap();
            fs::write(temp.path().join(CONFIG_FILE), "server_port: 4242\n").unwrap();
            let mut context = Context::from_environment(HashMap::new());
            context.current_directory = temp.path().to_path_buf();

            let result = Loader::load(&context, &None).unwrap();
            assert_eq!(result.server_port, 4242);
        }

        #[test]
        fn test_display_is_yaml() {
            let display = Main::default().to_string();

            assert!(display.starts_with("Configuration:\n"));
            assert!(display.contains("server_port: 8080"));
        }
    }
}
