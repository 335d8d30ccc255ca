use crate::config::StorageConfig;
use async_trait::async_trait;
use derive_more::Display;
use std::{path::Path, str::FromStr};
use tokio::io::AsyncRead;
use uploadkit_core::storage::{Error, ErrorKind, File, Result, Uploader};
use uploadkit_sbe_fs::{Filesystem, options::FsOptions};
use uploadkit_sbe_ftp::{FtpUploader, options::FtpOptions};
use uploadkit_sbe_oss::{ObjectStorage, options::OssOptions};

/// The storage engines that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EngineKind {
    /// Files on local disk.
    #[display("local")]
    Local,
    /// Files on an FTP server.
    #[display("ftp")]
    Ftp,
    /// Objects in an S3 compatible bucket.
    #[display("oss")]
    Oss,
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            uploadkit_sbe_fs::ENGINE_NAME => Ok(EngineKind::Local),
            uploadkit_sbe_ftp::ENGINE_NAME => Ok(EngineKind::Ftp),
            uploadkit_sbe_oss::ENGINE_NAME => Ok(EngineKind::Oss),
            other => Err(Error::new(ErrorKind::Configuration, format!("no such storage engine: {:?}", other))),
        }
    }
}

/// One of the storage back-ends, chosen at runtime.
#[derive(Debug)]
pub enum Engine {
    /// See [`Filesystem`].
    Local(Filesystem),
    /// See [`FtpUploader`].
    Ftp(FtpUploader),
    /// See [`ObjectStorage`].
    Oss(ObjectStorage),
}

impl Engine {
    /// Builds the back-end `config` selects. Missing or invalid settings fail with
    /// [`ErrorKind::Configuration`]; an FTP server that cannot be reached fails with
    /// [`ErrorKind::Connectivity`].
    pub async fn from_config(config: &StorageConfig) -> Result<Engine> {
        let engine = match config.kind()? {
            EngineKind::Local => Engine::Local(Filesystem::with_options(FsOptions::from_settings(&config.settings)?)?),
            EngineKind::Ftp => Engine::Ftp(FtpUploader::connect(FtpOptions::from_settings(&config.settings)?).await?),
            EngineKind::Oss => Engine::Oss(ObjectStorage::new(&OssOptions::from_settings(&config.settings)?)?),
        };
        Ok(engine)
    }

    /// Which kind of back-end this is.
    pub fn kind(&self) -> EngineKind {
        match self {
            Engine::Local(_) => EngineKind::Local,
            Engine::Ftp(_) => EngineKind::Ftp,
            Engine::Oss(_) => EngineKind::Oss,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $u:ident => $call:expr) => {
        match $self {
            Engine::Local($u) => $call,
            Engine::Ftp($u) => $call,
            Engine::Oss($u) => $call,
        }
    };
}

#[async_trait]
impl Uploader for Engine {
    fn engine_name(&self) -> &str {
        dispatch!(self, u => u.engine_name())
    }

    fn base_dir(&self) -> Option<&Path> {
        dispatch!(self, u => u.base_dir())
    }

    fn full_url(&self, path: &str) -> String {
        dispatch!(self, u => u.full_url(path))
    }

    async fn upload<R>(&self, path: &str, content: R) -> Result<String>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        dispatch!(self, u => u.upload(path, content).await)
    }

    async fn list(&self, dir: &str) -> Result<Vec<File>> {
        dispatch!(self, u => u.list(dir).await)
    }

    async fn info(&self, path: &str) -> Result<File> {
        dispatch!(self, u => u.info(path).await)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        dispatch!(self, u => u.exists(path).await)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        dispatch!(self, u => u.remove(path).await)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        dispatch!(self, u => u.mkdir(path).await)
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        dispatch!(self, u => u.rmdir(path).await)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        dispatch!(self, u => u.rename(from, to).await)
    }

    async fn content(&self, path: &str) -> Result<Vec<u8>> {
        dispatch!(self, u => u.content(path).await)
    }

    async fn close(&self) -> Result<()> {
        dispatch!(self, u => u.close().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("local", EngineKind::Local)]
    #[case("ftp", EngineKind::Ftp)]
    #[case("oss", EngineKind::Oss)]
    fn parses_engine_names(#[case] name: &str, #[case] kind: EngineKind) {
        assert_eq!(name.parse::<EngineKind>().unwrap(), kind);
        assert_eq!(kind.to_string(), name);
    }

    #[rstest]
    #[case("")]
    #[case("LOCAL")]
    #[case(" ftp")]
    #[case("s3")]
    fn rejects_unknown_engines(#[case] name: &str) {
        let err = name.parse::<EngineKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("no such storage engine"));
    }
}
