// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashSet;

// https://specifications.freedesktop.org/basedir-spec/latest/
pub const KEY_XDG__CACHE_HOME: &str = "XDG_CACHE_HOME";
pub const KEY_OS__HOME: &str = "HOME";

// man page for `locale` (environment variables section)
pub const KEY_LOCALE__ALL: &str = "LC_ALL";
pub const KEY_LOCALE__LANG: &str = "LANG";
pub const KEY_LOCALE__LANGUAGE: &str = "LANGUAGE";

// man page for `pam_systemd`
pub const KEY_SESSION__CURRENT_DESKTOP: &str = "XDG_CURRENT_DESKTOP";
pub const KEY_SESSION__DESKTOP: &str = "XDG_SESSION_DESKTOP";
pub const KEY_SESSION__TYPE: &str = "XDG_SESSION_TYPE";

static CACHE_KEYS: std::sync::LazyLock<HashSet<&'static str>> =
    std::sync::LazyLock::new(|| [KEY_XDG__CACHE_HOME, KEY_OS__HOME].iter().cloned().collect());

static LOCALE_KEYS: std::sync::LazyLock<HashSet<&'static str>> = std::sync::LazyLock::new(|| {
    [KEY_LOCALE__ALL, KEY_LOCALE__LANG, KEY_LOCALE__LANGUAGE]
        .iter()
        .cloned()
        .collect()
});

static SESSION_KEYS: std::sync::LazyLock<HashSet<&'static str>> = std::sync::LazyLock::new(|| {
    [
        KEY_SESSION__CURRENT_DESKTOP,
        KEY_SESSION__DESKTOP,
        KEY_SESSION__TYPE,
    ]
    .iter()
    .cloned()
    .collect()
});

/// Environment variables which influence where reports are stored or what is collected.
pub fn relevant_env(key: &str) -> bool {
    CACHE_KEYS.contains(key) || LOCALE_KEYS.contains(key) || SESSION_KEYS.contains(key)
}

/// Environment variables consumed by the collector.
pub fn collector_env(key: &str) -> bool {
    LOCALE_KEYS.contains(key) || SESSION_KEYS.contains(key)
}
