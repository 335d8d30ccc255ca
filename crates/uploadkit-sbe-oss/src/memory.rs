//! An [`ObjectStore`] that keeps its objects in memory. Useful for tests and for running
//! without any object storage at hand.

use crate::store::{Listing, ObjectMeta, ObjectStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use uploadkit_core::storage::{Error, ErrorKind, Result};

#[derive(Debug, Clone)]
struct Object {
    content: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// Objects held in a sorted map, so listings come back in key order like they do from S3.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Object>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

fn meta(key: &str, object: &Object) -> ObjectMeta {
    ObjectMeta {
        key: key.to_string(),
        size: object.content.len() as u64,
        last_modified: Some(object.last_modified),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<()> {
        let object = Object {
            content,
            last_modified: Utc::now(),
        };
        self.objects.write().await.insert(key.to_string(), object);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self.objects.read().await.get(key) {
            Some(object) => Ok(object.content.clone()),
            None => Err(Error::new(ErrorKind::NotFound, format!("no such key {}", key))),
        }
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        Ok(self.objects.read().await.get(key).map(|o| meta(key, o)))
    }

    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Listing> {
        let objects = self.objects.read().await;
        let mut listing = Listing::default();
        let mut prefixes = BTreeSet::new();
        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match delimiter.and_then(|d| rest.find(d).map(|i| i + d.len())) {
                Some(end) => {
                    prefixes.insert(format!("{}{}", prefix, &rest[..end]));
                }
                None => listing.objects.push(meta(key, object)),
            }
        }
        listing.prefixes = prefixes.into_iter().collect();
        Ok(listing)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get(from)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no such key {}", from)))?;
        objects.insert(to.to_string(), object);
        Ok(())
    }
}
