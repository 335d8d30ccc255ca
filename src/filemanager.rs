//! The file manager of the admin system, on top of any [`Uploader`].
//!
//! [`format_list`] turns a directory listing into the shape the file manager front-end
//! expects. [`FileManager`] implements the operations behind its buttons.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncRead;
use uploadkit_core::storage::{Error, ErrorKind, File, Result, Uploader, path};

/// URL prefix the front-end puts in front of the paths it sends.
pub const DEFAULT_URL_PREFIX: &str = "/uploads/";

/// Characters that may not appear in a file or directory name.
pub const FORBIDDEN_CHARACTERS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Whether an entry is a directory or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A directory.
    Dir,
    /// A regular file.
    File,
}

/// One entry as shown by the file manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FmEntry {
    /// Name of the entry.
    pub basename: String,
    /// Name of the entry.
    pub filename: String,
    /// The directory the entry is in, `""` at the root.
    pub dirname: String,
    /// Path of the entry.
    pub path: String,
    /// Lower-cased extension without the dot, `""` when there is none.
    pub extension: String,
    /// `dir` or `file`.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Modification time in milliseconds since the unix epoch.
    pub timestamp: i64,
    /// Size in bytes.
    pub size: u64,
}

/// A listing split into directories and files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tree {
    /// The directories, in listing order.
    pub directories: Vec<FmEntry>,
    /// The files, in listing order.
    pub files: Vec<FmEntry>,
}

/// Converts a listing into the file manager's representation.
pub fn format_list(files: Vec<File>) -> Tree {
    let mut tree = Tree::default();
    for file in files {
        let full_path = path::forward_slashes(&file.full_path);
        let name = path::file_name(&full_path).to_string();
        let entry = FmEntry {
            basename: name.clone(),
            extension: if file.is_dir { String::new() } else { path::extension(&name) },
            filename: name,
            dirname: path::parent(&full_path).to_string(),
            kind: if file.is_dir { EntryKind::Dir } else { EntryKind::File },
            timestamp: file.mtime.timestamp_millis(),
            size: file.size,
            path: full_path,
        };
        match entry.kind {
            EntryKind::Dir => tree.directories.push(entry),
            EntryKind::File => tree.files.push(entry),
        }
    }
    tree
}

/// Rejects names that contain one of the [`FORBIDDEN_CHARACTERS`], or nothing at all.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::new(ErrorKind::InvalidName, "the name is empty"));
    }
    if name.contains(FORBIDDEN_CHARACTERS) {
        let listed: Vec<String> = FORBIDDEN_CHARACTERS.iter().map(char::to_string).collect();
        return Err(Error::new(ErrorKind::InvalidName, format!("the name may not contain any of {}", listed.join(" "))).context("validate", name));
    }
    Ok(())
}

// The last segment of a path as the front-end sent it.
fn leaf(raw: &str) -> &str {
    raw.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

/// An item to delete, as sent by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteItem {
    /// The path to delete.
    pub path: String,
    /// Whether `path` is a directory or a file.
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// Why an item could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    /// The path as it was requested.
    pub path: String,
    /// What went wrong.
    pub error: String,
}

/// The outcome of [`FileManager::delete`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    /// How many items were deleted.
    pub deleted: usize,
    /// The items that were not.
    pub failures: Vec<DeleteFailure>,
}

impl DeleteReport {
    /// True when every item was deleted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The file manager operations, on whatever back-end it is given.
#[derive(Debug)]
pub struct FileManager<U> {
    uploader: Arc<U>,
    url_prefix: String,
}

impl<U: Uploader> FileManager<U> {
    /// Creates a file manager on top of `uploader`.
    pub fn new(uploader: Arc<U>) -> Self {
        FileManager {
            uploader,
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
        }
    }

    /// Sets the URL prefix that is stripped from incoming paths.
    pub fn url_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// The back-end in use.
    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    fn strip<'a>(&self, raw: &'a str) -> &'a str {
        if self.url_prefix.is_empty() {
            return raw;
        }
        raw.strip_prefix(self.url_prefix.as_str()).unwrap_or(raw)
    }

    /// Lists `dir`.
    pub async fn tree(&self, dir: &str) -> Result<Tree> {
        Ok(format_list(self.uploader.list(self.strip(dir)).await?))
    }

    /// Stores an uploaded file named `file_name` in `dir`. Unless `overwrite` is set, an
    /// existing file is left alone and [`ErrorKind::Conflict`] is returned.
    pub async fn upload<R>(&self, dir: &str, file_name: &str, content: R, overwrite: bool) -> Result<String>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        validate_name(file_name)?;
        let target = path::join(self.strip(dir).trim_end_matches('/'), file_name);
        if !overwrite && self.uploader.exists(&target).await? {
            return Err(Error::new(ErrorKind::Conflict, "a file with this name already exists").context("upload", &target));
        }
        self.uploader.upload(&target, content).await
    }

    /// Creates a file at `path` and describes it.
    pub async fn create_file<R>(&self, path: &str, content: R) -> Result<File>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let stored = self.uploader.upload(self.strip(path), content).await?;
        self.uploader.info(&stored).await
    }

    /// Replaces the content of the file at `path`.
    pub async fn update_file<R>(&self, path: &str, content: R) -> Result<String>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        self.uploader.upload(self.strip(path), content).await
    }

    /// Creates the directory `path`.
    pub async fn create_directory(&self, path: &str) -> Result<()> {
        let path = self.strip(path);
        validate_name(leaf(path))?;
        self.uploader.mkdir(path).await
    }

    /// Renames `from` to `to`. The new name is validated like a new directory name.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let to = self.strip(to);
        validate_name(leaf(to))?;
        self.uploader.rename(self.strip(from), to).await
    }

    /// Deletes every item, directories recursively. Failures do not stop the remaining items
    /// from being deleted; they are collected in the report.
    pub async fn delete(&self, items: &[DeleteItem]) -> DeleteReport {
        let mut report = DeleteReport::default();
        for item in items {
            let path = self.strip(&item.path);
            let result = match item.kind {
                EntryKind::Dir => self.uploader.rmdir(path).await,
                EntryKind::File => self.uploader.remove(path).await,
            };
            match result {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::warn!(path = %item.path, error = %e, "could not delete");
                    report.failures.push(DeleteFailure {
                        path: item.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// The content of the file at `path`.
    pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.uploader.content(self.strip(path)).await
    }

    /// The public URL of `path`.
    pub fn url(&self, path: &str) -> String {
        self.uploader.full_url(self.strip(path))
    }
}
