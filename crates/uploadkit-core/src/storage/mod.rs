//! Contains the [`Uploader`] trait that storage back-ends implement, along with the back-end
//! agnostic [`File`] description and the error taxonomy shared by all of them.
//!
//! Pre-made implementations live in the `uploadkit-sbe-*` crates:
//!
//! - `uploadkit-sbe-fs` stores files below a directory on local disk,
//! - `uploadkit-sbe-ftp` stores files on an FTP server over a single, self-healing session,
//! - `uploadkit-sbe-oss` stores files in an S3 compatible bucket such as Aliyun OSS.
//!
//! To create a new storage back-end implement [`Uploader`]; resolve every incoming path with
//! [`path::canonicalize`] and only ever return canonical paths.

mod error;
pub use error::{Error, ErrorKind};

pub mod path;

mod uploader;
pub use uploader::{File, Result, Uploader, full_url, system_time};
