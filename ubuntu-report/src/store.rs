// SPDX-License-Identifier: GPL-3.0-or-later

//! This module contains the on-disk state of the client.
//!
//! Two kinds of files live in the report directory of the user cache:
//!
//! ```text
//! ${XDG_CACHE_HOME or $HOME/.cache}/ubuntu-report/
//!     <distro>.<version>      # report of that identity, written after a successful send
//!     pending                 # payload of the last send that failed to deliver
//! ```
//!
//! The existence of a report file is the only signal that an identity was
//! already reported. Its content is the exact payload which was sent.

use crate::collector::Identity;
use crate::context::Context;
use crate::environment::KEY_XDG__CACHE_HOME;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

const DEFAULT_CACHE_DIR: &str = ".cache";
const REPORT_DIR: &str = "ubuntu-report";
const PENDING_FILE: &str = "pending";

/// Location of the report directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLayout {
    directory: PathBuf,
}

impl CacheLayout {
    /// Resolve the report directory.
    ///
    /// The cache root is taken from (in order): the explicit override,
    /// `XDG_CACHE_HOME` when it is an absolute path, `$HOME/.cache`.
    pub fn resolve(context: &Context, cache_override: Option<&Path>) -> Result<Self, StoreError> {
        let root = match cache_override {
            Some(root) => root.to_path_buf(),
            None => match context.var(KEY_XDG__CACHE_HOME).map(PathBuf::from) {
                Some(xdg) if xdg.is_absolute() => xdg,
                _ => context.home_dir().ok_or(StoreError::HomeDirectory)?.join(DEFAULT_CACHE_DIR),
            },
        };
        Ok(Self::from_cache_root(&root))
    }

    /// Use the report directory under the given cache root.
    pub fn from_cache_root(root: &Path) -> Self {
        Self { directory: root.join(REPORT_DIR) }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// The idempotence ledger of the sent reports.
#[derive(Debug, Clone)]
pub struct ReportStore {
    layout: CacheLayout,
}

impl ReportStore {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    /// The canonical report path of an identity.
    pub fn path(&self, identity: &Identity) -> PathBuf {
        self.layout.directory.join(format!("{}.{}", identity.distro, identity.version))
    }

    /// Returns true if a report exists for the identity. An empty file counts as a report.
    pub fn exists(&self, identity: &Identity) -> bool {
        self.path(identity).exists()
    }

    /// Returns the payload which was sent for the identity.
    pub fn read(&self, identity: &Identity) -> Result<Vec<u8>, StoreError> {
        read_file(&self.path(identity))
    }

    /// Record the payload as the report of the identity, replacing any previous one.
    pub fn write(&self, identity: &Identity, payload: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.path(identity);
        log::debug!("Save sent metrics to {}", path.display());
        write_file(&path, payload)?;
        Ok(path)
    }
}

/// The single slot which holds a payload that could not be delivered.
#[derive(Debug, Clone)]
pub struct PendingStore {
    layout: CacheLayout,
}

impl PendingStore {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    pub fn path(&self) -> PathBuf {
        self.layout.directory.join(PENDING_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Stage the payload, replacing the previously pending one.
    pub fn write(&self, payload: &[u8]) -> Result<(), StoreError> {
        let path = self.path();
        log::debug!("Save pending metrics to {}", path.display());
        write_file(&path, payload)
    }

    /// Returns the pending payload, or `StoreError::NotFound` when nothing is staged.
    pub fn read(&self) -> Result<Vec<u8>, StoreError> {
        read_file(&self.path())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let path = self.path();
        fs::remove_file(&path).map_err(|source| StoreError::Io { path, source })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, StoreError> {
    fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
        _ => StoreError::Io { path: path.to_path_buf(), source },
    })
}

/// Write the file through a temporary file in the same directory and rename it,
/// so readers never observe a partially written file.
fn write_file(path: &Path, payload: &[u8]) -> Result<(), StoreError> {
    let directory = path.parent().ok_or_else(|| StoreError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"),
    })?;
    create_private_dir(directory)
        .map_err(|source| StoreError::Io { path: directory.to_path_buf(), source })?;

    let io_error = |source| StoreError::Io { path: path.to_path_buf(), source };
    let mut file = tempfile::NamedTempFile::new_in(directory).map_err(io_error)?;
    file.write_all(payload).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    set_shared_permissions(file.as_file()).map_err(io_error)?;
    file.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}

#[cfg(unix)]
fn create_private_dir(directory: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(directory)
}

#[cfg(not(unix))]
fn create_private_dir(directory: &Path) -> io::Result<()> {
    fs::create_dir_all(directory)
}

#[cfg(unix)]
fn set_shared_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_shared_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("couldn't get user home directory")]
    HomeDirectory,
    #[error("no file found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("couldn't access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn identity() -> Identity {
        Identity::new("ubuntu", "22.04").unwrap()
    }

    fn context(vars: &[(&str, &str)]) -> Context {
        Context::from_environment(
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_resolve_prefers_override() {
        let ctx = context(&[("XDG_CACHE_HOME", "/xdg"), ("HOME", "/home/user")]);
        let layout = CacheLayout::resolve(&ctx, Some(Path::new("/override"))).unwrap();

        assert_eq!(layout.directory(), Path::new("/override/ubuntu-report"));
    }

    #[test]
    fn test_resolve_uses_absolute_xdg_cache_home() {
        let ctx = context(&[("XDG_CACHE_HOME", "/xdg"), ("HOME", "/home/user")]);
        let layout = CacheLayout::resolve(&ctx, None).unwrap();

        assert_eq!(layout.directory(), Path::new("/xdg/ubuntu-report"));
    }

    #[test]
    fn test_resolve_ignores_relative_xdg_cache_home() {
        let ctx = context(&[("XDG_CACHE_HOME", "relative"), ("HOME", "/home/user")]);
        let layout = CacheLayout::resolve(&ctx, None).unwrap();

        assert_eq!(layout.directory(), Path::new("/home/user/.cache/ubuntu-report"));
    }

    #[test]
    fn test_report_path_is_stable() {
        let ctx = context(&[("HOME", "/home/user")]);
        let first = ReportStore::new(CacheLayout::resolve(&ctx, None).unwrap());
        let second = ReportStore::new(CacheLayout::resolve(&ctx, None).unwrap());

        assert_eq!(first.path(&identity()), second.path(&identity()));
        assert_eq!(
            first.path(&identity()),
            PathBuf::from("/home/user/.cache/ubuntu-report/ubuntu.22.04")
        );
    }

    #[test]
    fn test_report_write_creates_private_directory() {
        let temp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(CacheLayout::from_cache_root(temp.path()));

        assert!(!store.exists(&identity()));
        let path = store.write(&identity(), b"{\"Version\": \"22.04\"}").unwrap();

        assert!(store.exists(&identity()));
        assert_eq!(path, temp.path().join("ubuntu-report").join("ubuntu.22.04"));
        assert_eq!(store.read(&identity()).unwrap(), b"{\"Version\": \"22.04\"}");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(temp.path().join("ubuntu-report")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_report_write_overwrites() {
        let temp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(CacheLayout::from_cache_root(temp.path()));

        store.write(&identity(), b"first payload which is longer").unwrap();
        store.write(&identity(), b"second").unwrap();

        assert_eq!(store.read(&identity()).unwrap(), b"second");
    }

    // A concurrent reader sees either the old or the new content, never a mix:
    // the new content is renamed over the old file in one step.
    #[test]
    fn test_report_write_leaves_no_temporary_files() {
        let temp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(CacheLayout::from_cache_root(temp.path()));

        store.write(&identity(), b"one").unwrap();
        store.write(&identity(), b"two").unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path().join("ubuntu-report"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("ubuntu.22.04")]);
    }

    #[test]
    fn test_empty_report_counts_as_reported() {
        let temp = tempfile::tempdir().unwrap();
        let store = ReportStore::new(CacheLayout::from_cache_root(temp.path()));
        fs::create_dir_all(temp.path().join("ubuntu-report")).unwrap();
        fs::write(store.path(&identity()), b"").unwrap();

        assert!(store.exists(&identity()));
    }

    #[test]
    fn test_pending_lifecycle() {
        let temp = tempfile::tempdir().unwrap();
        let pending = PendingStore::new(CacheLayout::from_cache_root(temp.path()));

        assert!(matches!(pending.read(), Err(StoreError::NotFound(_))));

        pending.write(b"first").unwrap();
        pending.write(b"second").unwrap();
        assert!(pending.exists());
        assert_eq!(pending.read().unwrap(), b"second");

        pending.clear().unwrap();
        assert!(!pending.exists());
        assert!(pending.clear().is_err());
    }

    #[test]
    fn test_pending_shares_report_directory() {
        let layout = CacheLayout::from_cache_root(Path::new("/cache"));
        let pending = PendingStore::new(layout.clone());
        let reports = ReportStore::new(layout);

        assert_eq!(pending.path(), PathBuf::from("/cache/ubuntu-report/pending"));
        assert_eq!(pending.path().parent(), reports.path(&identity()).parent());
    }
}
