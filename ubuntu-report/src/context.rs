// SPDX-License-Identifier: GPL-3.0-or-later

use crate::environment;
use crate::environment::KEY_OS__HOME;
use anyhow::{Context as AnyhowContext, Result};
use directories::BaseDirs;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Application context containing runtime environment information.
///
/// This struct captures the environmental context needed at startup:
/// the executable, the working directory and the environment variables.
/// Everything that later depends on the environment (cache location,
/// locale and session of the collector) reads it from here, so those
/// phases can be exercised without touching the process environment.
#[derive(Debug, Clone)]
pub struct Context {
    /// Path to the current executable
    pub current_executable: PathBuf,
    /// Current working directory when the program was invoked
    pub current_directory: PathBuf,
    /// All environment variables at startup
    pub environment: HashMap<String, String>,
}

impl Context {
    /// Capture the current application context.
    ///
    /// This function performs I/O operations to gather system state and should
    /// be called early in the application lifecycle.
    pub fn capture() -> Result<Self> {
        let current_executable =
            env::current_exe().with_context(|| "Failed to get current executable path")?;

        let current_directory =
            env::current_dir().with_context(|| "Failed to get current working directory")?;

        let environment = env::vars().collect::<HashMap<String, String>>();

        Ok(Context { current_executable, current_directory, environment })
    }

    /// Create a context from an explicit environment.
    pub fn from_environment(environment: HashMap<String, String>) -> Self {
        Context {
            current_executable: PathBuf::new(),
            current_directory: PathBuf::from("/"),
            environment,
        }
    }

    /// Returns the value of an environment variable, if it is set and not empty.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str).filter(|value| !value.is_empty())
    }

    /// Returns the home directory of the user.
    ///
    /// The `HOME` variable wins, otherwise the user record of the system is consulted.
    pub fn home_dir(&self) -> Option<PathBuf> {
        match self.var(KEY_OS__HOME) {
            Some(home) => Some(PathBuf::from(home)),
            None => BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Application Context:")?;
        writeln!(f, "Current Executable: {}", self.current_executable.display())?;
        writeln!(f, "Current Directory: {}", self.current_directory.display())?;
        writeln!(f, "Total Environment Variables: {} entries", self.environment.len())?;

        writeln!(f, "Relevant Environment Variables:")?;
        let mut relevant: Vec<_> =
            self.environment.iter().filter(|(key, _)| environment::relevant_env(key)).collect();
        relevant.sort();
        for (key, value) in relevant {
            writeln!(f, "  {}={}", key, value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_capture() {
        let context = Context::capture();
        assert!(context.is_ok());

        let ctx = context.unwrap();

        assert!(ctx.current_directory.is_absolute());
        assert!(ctx.current_executable.is_absolute());
    }

    #[test]
    fn test_display_includes_relevant_env_vars() {
        let mut test_env = HashMap::new();
        test_env.insert("HOME".to_string(), "/home/user".to_string());
        test_env.insert("LANG".to_string(), "fr_FR.UTF-8".to_string());
        test_env.insert("IRRELEVANT_VAR".to_string(), "value".to_string());

        let context = Context::from_environment(test_env);
        let display_output = format!("{}", context);

        assert!(display_output.contains("HOME=/home/user"));
        assert!(display_output.contains("LANG=fr_FR.UTF-8"));
        assert!(!display_output.contains("IRRELEVANT_VAR=value"));
        assert!(display_output.contains("Total Environment Variables: 3 entries"));
    }

    #[test]
    fn test_var_ignores_empty_values() {
        let context = Context::from_environment(HashMap::from([
            ("HOME".to_string(), "".to_string()),
            ("LANG".to_string(), "C".to_string()),
        ]));

        assert_eq!(context.var("HOME"), None);
        assert_eq!(context.var("LANG"), Some("C"));
        assert_eq!(context.var("MISSING"), None);
    }

    #[test]
    fn test_home_dir_prefers_environment() {
        let context = Context::from_environment(HashMap::from([(
            "HOME".to_string(),
            "/home/tester".to_string(),
        )]));

        assert_eq!(context.home_dir(), Some(PathBuf::from("/home/tester")));
    }
}
