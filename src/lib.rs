//! uploadkit stores uploaded files on local disk, on an FTP server or in an S3 compatible object
//! store, behind one async interface.
//!
//! Every back-end implements [`Uploader`](storage::Uploader). Which one is used is a matter of
//! configuration: a [`StorageConfig`] names the engine (`local`, `ftp` or `oss`) and carries its
//! settings, and a [`Registry`] turns configurations into shared back-end instances.
//!
//! ```no_run
//! use uploadkit::{Registry, StorageConfig};
//! use uploadkit::storage::Uploader;
//!
//! # async fn run() -> uploadkit::storage::Result<()> {
//! let config = StorageConfig::new("ftp")
//!     .with_setting("FTP_SERVER_URL", "ftp://files.example.com")
//!     .with_setting("FTP_USER_NAME", "uploads")
//!     .with_setting("FTP_USER_PWD", "secret")
//!     .with_setting("FTP_URL_PREFIX", "https://files.example.com");
//! let registry = Registry::new(config);
//!
//! let uploader = registry.active().await?;
//! uploader.mkdir("2024/03").await?;
//! uploader.upload("2024/03/report.txt", &b"all good"[..]).await?;
//! println!("{}", uploader.full_url("2024/03/report.txt"));
//!
//! registry.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! On top of that, [`filemanager`] serves the admin file manager and [`attachment`] decides
//! where uploaded attachments go.

pub mod attachment;
mod config;
mod engine;
pub mod filemanager;
mod registry;

pub use config::StorageConfig;
pub use engine::{Engine, EngineKind};
pub use registry::Registry;
pub use uploadkit_core::{settings, storage};

/// The local disk back-end.
pub use uploadkit_sbe_fs as fs;
/// The FTP back-end.
pub use uploadkit_sbe_ftp as ftp;
/// The object storage back-end.
pub use uploadkit_sbe_oss as oss;
