//! Where uploaded attachments are stored.
//!
//! Attachments get a generated name so that uploads never collide:
//! `{upload_dir}/{owner}/{yyyymmdd}/{random}.{ext}`, with `public` as owner for anonymous
//! uploads. Only whitelisted extensions are accepted.

use chrono::NaiveDate;
use tokio::io::AsyncRead;
use uploadkit_core::storage::{Error, ErrorKind, Result, Uploader, path};

const RANDOM_NAME_LEN: usize = 10;

/// The owner directory of attachments that belong to nobody in particular.
pub const PUBLIC_OWNER: &str = "public";

/// Decides which attachments are accepted and where they go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPolicy {
    upload_dir: String,
    allowed: Vec<String>,
}

impl AttachmentPolicy {
    /// A policy storing below `upload_dir` that accepts `jpg`, `jpeg` and `png` images.
    pub fn new<D: Into<String>>(upload_dir: D) -> Self {
        AttachmentPolicy {
            upload_dir: upload_dir.into().trim_matches('/').to_string(),
            allowed: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
        }
    }

    /// Replaces the accepted extensions. They are compared case-insensitively.
    pub fn allow<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed = extensions.into_iter().map(|e| e.as_ref().trim_start_matches('.').to_lowercase()).collect();
        self
    }

    /// Whether a file named `file_name` is accepted.
    pub fn is_allowed(&self, file_name: &str) -> bool {
        let ext = path::extension(&path::forward_slashes(file_name));
        !ext.is_empty() && self.allowed.contains(&ext)
    }

    /// The path an attachment originally named `original` is stored under.
    pub fn storage_name(&self, original: &str, owner: Option<&str>, date: NaiveDate) -> Result<String> {
        if !self.is_allowed(original) {
            return Err(Error::new(ErrorKind::InvalidName, format!("only {} files are accepted", self.allowed.join(", "))).context("attach", original));
        }
        let ext = path::extension(&path::forward_slashes(original));
        let owner = owner.map(|o| o.trim_matches('/')).filter(|o| !o.is_empty()).unwrap_or(PUBLIC_OWNER);
        let random: String = uuid::Uuid::new_v4().simple().to_string().chars().take(RANDOM_NAME_LEN).collect();

        let mut name = String::new();
        if !self.upload_dir.is_empty() {
            name.push_str(&self.upload_dir);
            name.push('/');
        }
        name.push_str(&format!("{}/{}/{}.{}", owner, date.format("%Y%m%d"), random, ext));
        Ok(name)
    }

    /// Stores an attachment under a fresh name and returns the path it was stored at.
    pub async fn store<U, R>(&self, uploader: &U, original: &str, owner: Option<&str>, content: R) -> Result<String>
    where
        U: Uploader,
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let name = self.storage_name(original, owner, chrono::Local::now().date_naive())?;
        let stored = uploader.upload(&name, content).await?;
        tracing::info!(original, stored = %stored, "stored attachment");
        Ok(stored)
    }
}
