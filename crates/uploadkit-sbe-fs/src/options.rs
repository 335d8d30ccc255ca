//! Settings understood by the [`Filesystem`](crate::Filesystem) back-end.

use std::path::PathBuf;
use uploadkit_core::settings::{self, Settings};
use uploadkit_core::storage::Result;

/// Directory, relative to the working directory or absolute, that files are stored under.
pub const UPLOAD_DIR: &str = "UPLOAD_DIR";
/// Optional URL prefix that public URLs are built from.
pub const UPLOAD_URL_PREFIX: &str = "UPLOAD_URL_PREFIX";
/// Site URL used for public URLs when no prefix is configured.
pub const SITE_URL: &str = "SITE_URL";

pub(crate) const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub(crate) const DEFAULT_URL_PREFIX: &str = "/uploads";

/// Typed form of the local back-end settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsOptions {
    /// The root directory.
    pub root: PathBuf,
    /// Prefix for public URLs.
    pub url_prefix: Option<String>,
    /// Host that public URLs are derived from without a prefix.
    pub site_url: String,
}

impl FsOptions {
    /// Reads the options from a settings map. Nothing is required: files go to `./uploads` and
    /// are served from `/uploads` unless configured otherwise.
    pub fn from_settings(s: &Settings) -> Result<Self> {
        let url_prefix = match settings::optional(s, UPLOAD_URL_PREFIX) {
            Some(prefix) => Some(prefix.to_string()),
            None if settings::optional(s, SITE_URL).is_none() => Some(DEFAULT_URL_PREFIX.to_string()),
            None => None,
        };
        Ok(FsOptions {
            root: PathBuf::from(settings::optional(s, UPLOAD_DIR).unwrap_or(DEFAULT_UPLOAD_DIR)),
            url_prefix,
            site_url: settings::optional(s, SITE_URL).unwrap_or_default().to_string(),
        })
    }
}

impl From<PathBuf> for FsOptions {
    fn from(root: PathBuf) -> Self {
        FsOptions {
            root,
            url_prefix: Some(DEFAULT_URL_PREFIX.to_string()),
            site_url: String::new(),
        }
    }
}
