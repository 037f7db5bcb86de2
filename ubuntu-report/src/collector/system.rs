// SPDX-License-Identifier: GPL-3.0-or-later

use super::os_release::OsRelease;
use super::{Collector, CollectorError, Identity};
use crate::context::Context;
use crate::environment::{
    self, KEY_LOCALE__ALL, KEY_LOCALE__LANG, KEY_LOCALE__LANGUAGE, KEY_SESSION__CURRENT_DESKTOP,
    KEY_SESSION__DESKTOP, KEY_SESSION__TYPE,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Collects metrics from a system root and the user session environment.
///
/// The root is `/` for the running system; tests point it to a prepared
/// directory tree.
pub struct SystemCollector {
    root: PathBuf,
    environment: HashMap<String, String>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetricsData {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    arch: String,
    #[serde(rename = "RAM", skip_serializing_if = "Option::is_none")]
    ram: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timezone: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Session {
    #[serde(rename = "DE")]
    de: String,
    name: String,
    #[serde(rename = "Type")]
    kind: String,
}

impl SystemCollector {
    pub fn new(root: &Path, context: &Context) -> Self {
        let environment = context
            .environment
            .iter()
            .filter(|(key, _)| environment::collector_env(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { root: root.to_path_buf(), environment }
    }

    fn read(&self, relative: &str) -> Result<String, CollectorError> {
        let path = self.root.join(relative);
        fs::read_to_string(&path).map_err(|source| CollectorError::Io { path, source })
    }

    /// Optional sources are logged and skipped when they can't be read.
    fn read_optional(&self, relative: &str) -> Option<String> {
        let path = self.root.join(relative);
        fs::read_to_string(&path)
            .inspect_err(|error| log::info!("Skipping optional source {}: {error}", path.display()))
            .ok()
    }

    fn getenv(&self, key: &str) -> &str {
        self.environment.get(key).map(String::as_str).unwrap_or_default()
    }

    fn language(&self) -> Option<String> {
        let lang = [KEY_LOCALE__ALL, KEY_LOCALE__LANG]
            .iter()
            .map(|key| self.getenv(key))
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| self.getenv(KEY_LOCALE__LANGUAGE).split(':').next().unwrap_or_default());
        let lang = lang.split('.').next().unwrap_or_default();
        (!lang.is_empty()).then(|| lang.to_string())
    }

    fn session(&self) -> Option<Session> {
        let session = Session {
            de: self.getenv(KEY_SESSION__CURRENT_DESKTOP).to_string(),
            name: self.getenv(KEY_SESSION__DESKTOP).to_string(),
            kind: self.getenv(KEY_SESSION__TYPE).to_string(),
        };
        let empty = session.de.is_empty() && session.name.is_empty() && session.kind.is_empty();
        (!empty).then_some(session)
    }

    fn ram(&self) -> Option<f64> {
        self.read_optional("proc/meminfo").as_deref().and_then(parse_mem_total)
    }

    fn timezone(&self) -> Option<String> {
        self.read_optional("etc/timezone")
            .map(|content| content.trim().to_string())
            .filter(|timezone| !timezone.is_empty())
    }
}

impl Collector for SystemCollector {
    fn identity(&self) -> Result<Identity, CollectorError> {
        let content = self.read("etc/os-release")?;
        super::parse_os_release(&content)
    }

    fn collect(&self) -> Result<Vec<u8>, CollectorError> {
        log::debug!("Collecting metrics on system with root set to {}", self.root.display());
        let release = self.read("etc/os-release").map(|content| OsRelease::parse(&content))?;

        let data = MetricsData {
            version: release.version_id,
            arch: debian_architecture(std::env::consts::ARCH).to_string(),
            ram: self.ram(),
            session: self.session(),
            language: self.language(),
            timezone: self.timezone(),
        };

        Ok(serde_json::to_vec_pretty(&data)?)
    }
}

/// Total memory in GB (SI), rounded to one decimal.
fn parse_mem_total(meminfo: &str) -> Option<f64> {
    let line = meminfo.lines().find(|line| line.starts_with("MemTotal:"))?;
    let kilobytes: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    let gigabytes = kilobytes as f64 / (1000.0 * 1000.0);
    Some((gigabytes * 10.0).round() / 10.0)
}

fn debian_architecture(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "powerpc64" => "ppc64el",
        other => other,
    }
}
