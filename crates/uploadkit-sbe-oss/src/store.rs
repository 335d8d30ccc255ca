//! The object store seam.
//!
//! [`ObjectStorage`](crate::ObjectStorage) maps the hierarchical [`Uploader`] operations onto a
//! flat key space. An [`ObjectStore`] is that key space: whole objects in and out, listings by
//! prefix. [`S3Store`](crate::S3Store) talks to a real bucket, [`MemoryStore`](crate::MemoryStore)
//! keeps everything in memory.
//!
//! [`Uploader`]: uploadkit_core::storage::Uploader

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use uploadkit_core::storage::Result;

/// What a store knows about one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// The full object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification, if reported.
    pub last_modified: Option<DateTime<Utc>>,
}

/// The result of listing a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Objects directly matching the listing.
    pub objects: Vec<ObjectMeta>,
    /// Key prefixes rolled up at the delimiter, each ending in the delimiter.
    pub prefixes: Vec<String>,
}

impl Listing {
    /// True when nothing at all was found under the prefix.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.prefixes.is_empty()
    }
}

/// A flat, key addressed object store.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug + 'static {
    /// Stores `content` under `key`, replacing any existing object.
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<()>;

    /// Fetches the object stored under `key`. Fails with `NotFound` when there is none.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Returns the metadata of `key`, `None` when there is no such object.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>>;

    /// Lists the keys starting with `prefix`. With a delimiter, keys that contain it after the
    /// prefix are rolled up into [`Listing::prefixes`].
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Listing>;

    /// Deletes `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Copies the object under `from` to `to`.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;
}
