//! An uploadkit [`Uploader`] that stores files in an S3 compatible object storage bucket, such
//! as Aliyun OSS.
//!
//! Object stores have no directories, only keys. This back-end presents the keys as a tree:
//! `a/b/c.png` is the file `c.png` in directory `a/b`. A directory exists when some key lives
//! below it or when its marker object (`a/b/`, empty) exists. [`Uploader::mkdir`] creates such
//! markers so that empty directories can be listed.
//!
//! ```no_run
//! use uploadkit_core::storage::Uploader;
//! use uploadkit_sbe_oss::{ObjectStorage, options::OssOptions};
//!
//! # async fn run() -> uploadkit_core::storage::Result<()> {
//! let mut options = OssOptions::new("oss-cn-hangzhou.aliyuncs.com", "media", "key-id", "key-secret");
//! options.root = "site".to_string();
//! let oss = ObjectStorage::new(&options)?;
//! oss.upload("2024/01/logo.png", &b"\x89PNG"[..]).await?;
//! println!("{}", oss.full_url("2024/01/logo.png"));
//! # Ok(())
//! # }
//! ```

mod memory;
pub mod options;
mod s3_store;
mod store;

pub use memory::MemoryStore;
pub use s3_store::S3Store;
pub use store::{Listing, ObjectMeta, ObjectStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use options::OssOptions;
use tokio::io::{AsyncRead, AsyncReadExt};
use uploadkit_core::storage::{self, Error, ErrorKind, File, Result, Uploader, path};

/// The name this back-end is selected by.
pub const ENGINE_NAME: &str = "oss";

const DELIMITER: &str = "/";

/// Stores files as objects, optionally below a common key prefix.
#[derive(Debug)]
pub struct ObjectStorage<S: ObjectStore = S3Store> {
    store: S,
    root: String,
    host: Option<String>,
    bucket_url: String,
}

impl ObjectStorage {
    /// Creates a back-end for the bucket described by `options`.
    pub fn new(options: &OssOptions) -> Result<Self> {
        Ok(Self::with_store(S3Store::new(options)?, options))
    }
}

impl<S: ObjectStore> ObjectStorage<S> {
    /// Creates a back-end on top of an arbitrary [`ObjectStore`], taking the key prefix and
    /// URL settings from `options`.
    pub fn with_store(store: S, options: &OssOptions) -> Self {
        ObjectStorage {
            store,
            root: options.root.trim_matches('/').to_string(),
            host: options.host.clone(),
            bucket_url: options.bucket_url(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // The object key of a canonical file path.
    fn key(&self, path: &str) -> String {
        match (self.root.is_empty(), path.is_empty()) {
            (true, _) => path.to_string(),
            (false, true) => self.root.clone(),
            (false, false) => format!("{}/{}", self.root, path),
        }
    }

    // The prefix everything inside a canonical directory shares.
    fn dir_prefix(&self, dir: &str) -> String {
        let key = self.key(dir);
        if key.is_empty() { key } else { format!("{}/", key) }
    }

    // The canonical path of an object key, the inverse of `key`.
    fn path_of<'a>(&self, key: &'a str) -> &'a str {
        if self.root.is_empty() {
            return key.trim_end_matches('/');
        }
        match key.strip_prefix(self.root.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_matches('/'),
            _ => key,
        }
    }

    async fn is_dir(&self, dir: &str) -> Result<bool> {
        if path::is_root(dir) {
            return Ok(true);
        }
        Ok(!self.store.list(&self.dir_prefix(dir), Some(DELIMITER)).await?.is_empty())
    }

    // Every key at or below a directory, the marker included.
    async fn keys_below(&self, dir: &str) -> Result<Vec<String>> {
        let listing = self.store.list(&self.dir_prefix(dir), None).await?;
        Ok(listing.objects.into_iter().map(|o| o.key).collect())
    }
}

#[async_trait]
impl<S: ObjectStore> Uploader for ObjectStorage<S> {
    fn engine_name(&self) -> &str {
        ENGINE_NAME
    }

    fn full_url(&self, path: &str) -> String {
        let key = self.key(&path::canonicalize(path).unwrap_or_default());
        storage::full_url(self.host.as_deref(), &self.bucket_url, &key)
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
        let mut content = content;
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await.map_err(|e| Error::from(e).context("upload", &path))?;
        tracing::debug!(bytes = buf.len(), "storing object");
        self.store.put(&self.key(&path), buf).await.map_err(|e| e.context("upload", &path))?;
        Ok(path)
    }

    #[tracing_attributes::instrument]
    async fn list(&self, dir: &str) -> Result<Vec<File>> {
        let dir = path::canonicalize(dir)?;
        let prefix = self.dir_prefix(&dir);
        let listing = self.store.list(&prefix, Some(DELIMITER)).await.map_err(|e| e.context("list", &dir))?;
        if listing.is_empty() && !path::is_root(&dir) {
            return Err(Error::from(ErrorKind::NotFound).context("list", &dir));
        }

        let mut files = Vec::with_capacity(listing.objects.len() + listing.prefixes.len());
        for sub in &listing.prefixes {
            let name = sub[prefix.len()..].trim_end_matches('/');
            if !name.is_empty() {
                files.push(File::directory(path::join(&dir, name), DateTime::<Utc>::UNIX_EPOCH));
            }
        }
        for object in listing.objects {
            // The directory's own marker.
            if object.key == prefix {
                continue;
            }
            let name = &object.key[prefix.len()..];
            let mtime = object.last_modified.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            files.push(File::file(path::join(&dir, name), object.size, mtime));
        }
        Ok(files)
    }

    #[tracing_attributes::instrument]
    async fn info(&self, path: &str) -> Result<File> {
        let path = path::canonicalize(path)?;
        if !path::is_root(&path) {
            if let Some(meta) = self.store.head(&self.key(&path)).await.map_err(|e| e.context("info", &path))? {
                let mtime = meta.last_modified.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                return Ok(File::file(path, meta.size, mtime));
            }
        }
        if !self.is_dir(&path).await.map_err(|e| e.context("info", &path))? {
            return Err(Error::from(ErrorKind::NotFound).context("info", &path));
        }
        let marker = self.store.head(&self.dir_prefix(&path)).await.map_err(|e| e.context("info", &path))?;
        let mtime = marker.and_then(|m| m.last_modified).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Ok(File::directory(path, mtime))
    }

    #[tracing_attributes::instrument]
    async fn remove(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        let key = self.key(&path);
        if !path::is_root(&path) && self.store.head(&key).await.map_err(|e| e.context("remove", &path))?.is_some() {
            return self.store.delete(&key).await.map_err(|e| e.context("remove", &path));
        }
        let kind = if self.is_dir(&path).await.map_err(|e| e.context("remove", &path))? {
            ErrorKind::IsADirectory
        } else {
            ErrorKind::NotFound
        };
        Err(Error::from(kind).context("remove", &path))
    }

    #[tracing_attributes::instrument]
    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        if path::is_root(&path) {
            return Ok(());
        }
        self.store.put(&self.dir_prefix(&path), Vec::new()).await.map_err(|e| e.context("mkdir", &path))
    }

    #[tracing_attributes::instrument]
    async fn rmdir(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        if path::is_root(&path) {
            return Err(Error::new(ErrorKind::PermissionDenied, "refusing to remove the storage root").context("rmdir", &path));
        }
        let keys = self.keys_below(&path).await.map_err(|e| e.context("rmdir", &path))?;
        if keys.is_empty() {
            return Err(Error::from(ErrorKind::NotFound).context("rmdir", &path));
        }
        for key in keys {
            self.store.delete(&key).await.map_err(|e| e.context("rmdir", self.path_of(&key)))?;
        }
        tracing::debug!("removed directory");
        Ok(())
    }

    #[tracing_attributes::instrument]
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = path::canonicalize(from)?;
        let to = path::canonicalize(to)?;
        if path::is_root(&from) || path::is_root(&to) {
            return Err(Error::new(ErrorKind::InvalidName, "cannot rename the storage root").context("rename", &from));
        }

        let from_key = self.key(&from);
        if self.store.head(&from_key).await.map_err(|e| e.context("rename", &from))?.is_some() {
            let to_key = self.key(&to);
            self.store.copy(&from_key, &to_key).await.map_err(|e| e.context("rename", &from))?;
            return self.store.delete(&from_key).await.map_err(|e| e.context("rename", &from));
        }

        // A directory is moved object by object. This is not atomic.
        let keys = self.keys_below(&from).await.map_err(|e| e.context("rename", &from))?;
        if keys.is_empty() {
            return Err(Error::from(ErrorKind::NotFound).context("rename", &from));
        }
        let (from_prefix, to_prefix) = (self.dir_prefix(&from), self.dir_prefix(&to));
        for key in keys {
            let target = format!("{}{}", to_prefix, &key[from_prefix.len()..]);
            self.store.copy(&key, &target).await.map_err(|e| e.context("rename", self.path_of(&key)))?;
            self.store.delete(&key).await.map_err(|e| e.context("rename", self.path_of(&key)))?;
        }
        Ok(())
    }

    #[tracing_attributes::instrument]
    async fn content(&self, path: &str) -> Result<Vec<u8>> {
        let path = path::canonicalize(path)?;
        if path::is_root(&path) {
            return Err(Error::from(ErrorKind::IsADirectory).context("content", &path));
        }
        let result = self.store.get(&self.key(&path)).await;
        if matches!(&result, Err(e) if e.kind() == ErrorKind::NotFound) && self.is_dir(&path).await.map_err(|e| e.context("content", &path))? {
            return Err(Error::from(ErrorKind::IsADirectory).context("content", &path));
        }
        result.map_err(|e| e.context("content", &path))
    }
}
