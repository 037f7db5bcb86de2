// SPDX-License-Identifier: GPL-3.0-or-later

use super::{CollectorError, Identity};

/// Values of the `os-release` file which are used by the collector.
#[derive(Debug, Default, PartialEq)]
pub(super) struct OsRelease {
    pub id: Option<String>,
    pub version_id: Option<String>,
}

impl OsRelease {
    pub(super) fn parse(content: &str) -> Self {
        let mut result = OsRelease::default();
        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = unquote(value.trim());
            match key.trim() {
                "ID" => result.id = Some(value),
                "VERSION_ID" => result.version_id = Some(value),
                _ => {}
            }
        }
        result
    }
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    stripped.trim().to_string()
}

/// Extract the identity from the content of an `os-release` file.
pub fn parse_os_release(content: &str) -> Result<Identity, CollectorError> {
    let release = OsRelease::parse(content);
    Identity::new(
        release.id.as_deref().unwrap_or_default(),
        release.version_id.as_deref().unwrap_or_default(),
    )
}
