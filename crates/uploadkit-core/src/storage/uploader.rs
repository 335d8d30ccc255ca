//! Defines the capability that every storage back-end implements.

use super::error::{Error, ErrorKind};
use super::path;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, path::Path, result, time::SystemTime};
use tokio::io::AsyncRead;

/// Result type used by traits in this module
pub type Result<T> = result::Result<T, Error>;

/// Describes a stored object independent of the back-end that holds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Identifier of the entry, equal to its canonical path.
    pub id: String,
    /// Canonical back-end relative path.
    pub full_path: String,
    /// The last path segment.
    pub name: String,
    /// Length in bytes, `0` for directories.
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Creation time if the back-end knows it, the modification time otherwise.
    pub ctime: DateTime<Utc>,
    /// Last modification time.
    pub mtime: DateTime<Utc>,
}

impl File {
    /// Describes a regular file at the canonical `path`.
    pub fn file(path: String, size: u64, mtime: DateTime<Utc>) -> File {
        File {
            id: path.clone(),
            name: path::file_name(&path).to_string(),
            full_path: path,
            size,
            is_dir: false,
            ctime: mtime,
            mtime,
        }
    }

    /// Describes a directory at the canonical `path`.
    pub fn directory(path: String, mtime: DateTime<Utc>) -> File {
        File {
            is_dir: true,
            ..File::file(path, 0, mtime)
        }
    }

    /// Overrides the creation time for back-ends that can report one.
    pub fn with_ctime(mut self, ctime: DateTime<Utc>) -> File {
        self.ctime = ctime;
        self
    }
}

/// Converts a `SystemTime` reported by a back-end.
pub fn system_time(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

/// Resolves a back-end relative path into a caller facing URL. The configured `prefix` wins;
/// without one the URL is derived from `host`.
pub fn full_url(prefix: Option<&str>, host: &str, path: &str) -> String {
    let path = path::canonicalize(path).unwrap_or_else(|_| path::forward_slashes(path).trim_start_matches('/').to_string());
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix.trim_end_matches('/'), path),
        _ => format!("{}/{}", host.trim_end_matches('/'), path),
    }
}

/// The `Uploader` trait is the single capability that the local disk, FTP and object storage
/// back-ends implement. Callers (the file manager, attachment uploads, backups) only ever talk
/// to this trait and do not know which back-end serves them.
///
/// All paths going in are resolved with [`path::canonicalize`] and all paths coming out are
/// canonical: relative to the back-end root and separated by `/`.
#[async_trait]
pub trait Uploader: Send + Sync + Debug {
    /// Stable identifier used for back-end selection, e.g. `"ftp"`.
    fn engine_name(&self) -> &str;

    /// The resolved local directory files are stored in. Only the local filesystem back-end has
    /// one.
    fn base_dir(&self) -> Option<&Path> {
        None
    }

    /// Resolves `path` into a URL that can be handed out to clients.
    fn full_url(&self, path: &str) -> String;

    /// Writes everything from `content` to `path`, creating missing parent directories and
    /// silently replacing an existing file. Returns the canonical path it was stored under.
    async fn upload<R>(&self, path: &str, content: R) -> Result<String>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static;

    /// Returns the immediate children of `dir`. An empty directory yields an empty list, a
    /// missing one an [`ErrorKind::NotFound`].
    async fn list(&self, dir: &str) -> Result<Vec<File>>;

    /// Returns the metadata of `path`.
    async fn info(&self, path: &str) -> Result<File>;

    /// Tells whether `path` exists. Absence is not an error.
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.info(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes the file at `path`. Directories are refused with [`ErrorKind::IsADirectory`].
    async fn remove(&self, path: &str) -> Result<()>;

    /// Creates the directory `path` including its parents.
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Deletes the directory `path` and everything below it.
    async fn rmdir(&self, path: &str) -> Result<()>;

    /// Moves `from` to `to`.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Reads the whole object into memory.
    async fn content(&self, path: &str) -> Result<Vec<u8>>;

    /// Releases connections held by the back-end. Calling it more than once is harmless.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
