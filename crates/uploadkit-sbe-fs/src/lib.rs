//! An uploadkit [`Uploader`] that keeps its files below a root directory on local disk.
//!
//! ```no_run
//! use uploadkit_core::storage::Uploader;
//! use uploadkit_sbe_fs::Filesystem;
//!
//! # async fn run() -> uploadkit_core::storage::Result<()> {
//! let fs = Filesystem::new("/srv/uploads")?;
//! fs.upload("2024/01/logo.png", &b"\x89PNG"[..]).await?;
//! for file in fs.list("2024/01").await? {
//!     println!("{} {}", file.full_path, file.size);
//! }
//! # Ok(())
//! # }
//! ```

mod cap_fs;
pub mod options;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use options::FsOptions;
use std::{
    fmt::Debug,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::{AsyncRead, AsyncWriteExt};
use uploadkit_core::storage::{self, Error, ErrorKind, File, Result, Uploader, path};

/// The name this back-end is selected by.
pub const ENGINE_NAME: &str = "local";

/// The Filesystem struct is an implementation of the [`Uploader`] trait that keeps its files
/// inside a specific root directory on local disk.
#[derive(Debug)]
pub struct Filesystem {
    // The Arc is necessary so we can hand the directory to the blocking pool.
    root_fd: Arc<cap_std::fs::Dir>,
    root: PathBuf,
    url_prefix: Option<String>,
    site_url: String,
}

/// Maps the canonical root onto the directory handle itself.
fn local(path: &str) -> &Path {
    if path::is_root(path) { Path::new(".") } else { Path::new(path) }
}

fn io_error<'a>(operation: &'static str, path: &'a str) -> impl FnOnce(io::Error) -> Error + 'a {
    move |e| Error::from(e).context(operation, path)
}

fn to_file(path: String, meta: &cap_std::fs::Metadata) -> File {
    let mtime = meta
        .modified()
        .map(|t| storage::system_time(t.into_std()))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let file = if meta.is_dir() {
        File::directory(path, mtime)
    } else {
        File::file(path, meta.len(), mtime)
    };
    match meta.created() {
        Ok(ctime) => file.with_ctime(storage::system_time(ctime.into_std())),
        Err(_) => file,
    }
}

impl Filesystem {
    /// Create a new Filesystem back-end, with the given root. No operations can take place
    /// outside of the root. For example, when the root is set to `/srv/uploads`, and a caller
    /// asks for `hello.txt`, it will get `/srv/uploads/hello.txt`. The root is created when
    /// it does not exist yet.
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        Self::with_options(FsOptions::from(root.into()))
    }

    /// Create a new Filesystem back-end from its typed options.
    pub fn with_options(options: FsOptions) -> Result<Self> {
        std::fs::create_dir_all(&options.root).map_err(|e| Error::new(ErrorKind::Configuration, e).context("open root", &options.root.to_string_lossy()))?;
        let root = std::fs::canonicalize(&options.root).map_err(|e| Error::new(ErrorKind::Configuration, e).context("open root", &options.root.to_string_lossy()))?;
        let aa = cap_std::ambient_authority();
        let root_fd = Arc::new(
            cap_std::fs::Dir::open_ambient_dir(&root, aa).map_err(|e| Error::new(ErrorKind::Configuration, e).context("open root", &root.to_string_lossy()))?,
        );
        tracing::debug!(root = %root.display(), "opened local storage root");
        Ok(Filesystem {
            root_fd,
            root,
            url_prefix: options.url_prefix,
            site_url: options.site_url,
        })
    }

    async fn metadata(&self, operation: &'static str, path: &str) -> Result<cap_std::fs::Metadata> {
        cap_fs::metadata(self.root_fd.clone(), local(path)).await.map_err(io_error(operation, path))
    }
}

#[async_trait]
impl Uploader for Filesystem {
    fn engine_name(&self) -> &str {
        ENGINE_NAME
    }

    fn base_dir(&self) -> Option<&Path> {
        Some(self.root.as_path())
    }

    fn full_url(&self, path: &str) -> String {
        storage::full_url(self.url_prefix.as_deref(), &self.site_url, path)
    }

    #[tracing_attributes::instrument(skip(content))]
    async fn upload<R>(&self, path: &str, content: R) -> Result<String>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let path = path::canonicalize(path)?;
        if path::is_root(&path) {
            return Err(Error::from(ErrorKind::IsADirectory).context("upload", &path));
        }
        let parent = path::parent(&path);
        if !path::is_root(parent) {
            cap_fs::create_dir_all(self.root_fd.clone(), parent).await.map_err(io_error("upload", &path))?;
        }

        let mut oo = cap_std::fs::OpenOptions::new();
        oo.write(true).create(true).truncate(true);
        let file = cap_fs::open_with(self.root_fd.clone(), &path, oo).await.map_err(io_error("upload", &path))?;
        let file = tokio::fs::File::from_std(file.into_std());

        let mut reader = tokio::io::BufReader::with_capacity(4096, content);
        let mut writer = tokio::io::BufWriter::with_capacity(4096, file);
        let bytes_copied = tokio::io::copy(&mut reader, &mut writer).await.map_err(io_error("upload", &path))?;
        writer.flush().await.map_err(io_error("upload", &path))?;
        tracing::debug!(bytes = bytes_copied, "stored");
        Ok(path)
    }

    #[tracing_attributes::instrument]
    async fn list(&self, dir: &str) -> Result<Vec<File>> {
        let dir = path::canonicalize(dir)?;
        let entries = cap_fs::read_dir(self.root_fd.clone(), local(&dir)).await.map_err(io_error("list", &dir))?;

        let mut files = Vec::with_capacity(entries.len());
        for (name, meta) in entries {
            match meta {
                Ok(meta) => files.push(to_file(path::join(&dir, &name), &meta)),
                // Dangling links and entries removed while listing are skipped.
                Err(e) => tracing::warn!(entry = %name, error = %e, "skipping unreadable directory entry"),
            }
        }
        Ok(files)
    }

    #[tracing_attributes::instrument]
    async fn info(&self, path: &str) -> Result<File> {
        let path = path::canonicalize(path)?;
        let meta = self.metadata("info", &path).await?;
        Ok(to_file(path, &meta))
    }

    #[tracing_attributes::instrument]
    async fn remove(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        let meta = self.metadata("remove", &path).await?;
        if meta.is_dir() {
            return Err(Error::from(ErrorKind::IsADirectory).context("remove", &path));
        }
        cap_fs::remove_file(self.root_fd.clone(), &path).await.map_err(io_error("remove", &path))
    }

    #[tracing_attributes::instrument]
    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        if path::is_root(&path) {
            return Ok(());
        }
        cap_fs::create_dir_all(self.root_fd.clone(), &path).await.map_err(io_error("mkdir", &path))
    }

    #[tracing_attributes::instrument]
    async fn rmdir(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        if path::is_root(&path) {
            return Err(Error::new(ErrorKind::PermissionDenied, "refusing to remove the storage root").context("rmdir", &path));
        }
        let meta = self.metadata("rmdir", &path).await?;
        if !meta.is_dir() {
            return Err(Error::new(ErrorKind::LocalError, "not a directory").context("rmdir", &path));
        }
        cap_fs::remove_dir_all(self.root_fd.clone(), &path).await.map_err(io_error("rmdir", &path))
    }

    #[tracing_attributes::instrument]
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = path::canonicalize(from)?;
        let to = path::canonicalize(to)?;
        if path::is_root(&from) || path::is_root(&to) {
            return Err(Error::new(ErrorKind::InvalidName, "cannot rename the storage root").context("rename", &from));
        }
        self.metadata("rename", &from).await?;

        let parent = path::parent(&to);
        if !path::is_root(parent) {
            cap_fs::create_dir_all(self.root_fd.clone(), parent).await.map_err(io_error("rename", &to))?;
        }
        cap_fs::rename(self.root_fd.clone(), &from, &to).await.map_err(io_error("rename", &from))
    }

    #[tracing_attributes::instrument]
    async fn content(&self, path: &str) -> Result<Vec<u8>> {
        let path = path::canonicalize(path)?;
        let meta = self.metadata("content", &path).await?;
        if meta.is_dir() {
            return Err(Error::from(ErrorKind::IsADirectory).context("content", &path));
        }
        cap_fs::read(self.root_fd.clone(), &path).await.map_err(io_error("content", &path))
    }
}

#[cfg(test)]
mod tests;
