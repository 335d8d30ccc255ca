//! The control connection seam.
//!
//! [`FtpUploader`](crate::FtpUploader) talks to the server through [`FtpSession`] and obtains
//! new sessions through a [`Connector`]. The production implementations wrap
//! [`async_ftp::FtpStream`].

use crate::options::FtpOptions;
use async_ftp::{FtpError, FtpStream, types::FileType};
use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};
use tokio::io::AsyncRead;
use uploadkit_core::storage::{Error, ErrorKind, Result};

/// Content handed to [`FtpSession::store`].
pub type Content = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// An authenticated FTP control connection. Paths are relative to the login directory and
/// the empty string stands for the login directory itself.
#[async_trait]
pub trait FtpSession: Send + 'static {
    /// Sends `NOOP`, used to check that the connection is still alive.
    async fn noop(&mut self) -> Result<()>;

    /// Logs out and closes the connection.
    async fn quit(&mut self) -> Result<()>;

    /// Returns the raw `LIST` lines for `dir`.
    async fn list(&mut self, dir: &str) -> Result<Vec<String>>;

    /// Creates a single directory.
    async fn mkdir(&mut self, dir: &str) -> Result<()>;

    /// Removes a single, empty, directory.
    async fn rmdir(&mut self, dir: &str) -> Result<()>;

    /// Deletes a file.
    async fn delete(&mut self, path: &str) -> Result<()>;

    /// Renames `from` to `to`.
    async fn rename(&mut self, from: &str, to: &str) -> Result<()>;

    /// Stores `content` at `path`, replacing what was there.
    async fn store(&mut self, path: &str, content: Content) -> Result<()>;

    /// Retrieves the complete content of `path`.
    async fn retrieve(&mut self, path: &str) -> Result<Vec<u8>>;
}

/// Dials and authenticates new sessions. Used for the initial connection and by the
/// keep-alive task to replace a dead one.
#[async_trait]
pub trait Connector: Send + Sync + Debug + 'static {
    /// The session type produced.
    type Session: FtpSession;

    /// Opens and logs in a new session.
    async fn connect(&self) -> Result<Self::Session>;
}

/// Connects to a real server with [`async_ftp`].
#[derive(Clone)]
pub struct AsyncFtpConnector {
    address: String,
    username: String,
    password: String,
    timeout: Duration,
}

impl Debug for AsyncFtpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFtpConnector")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl From<&FtpOptions> for AsyncFtpConnector {
    fn from(options: &FtpOptions) -> Self {
        AsyncFtpConnector {
            address: options.address(),
            username: options.username.clone(),
            password: options.password.clone(),
            timeout: options.connect_timeout,
        }
    }
}

impl AsyncFtpConnector {
    async fn dial(&self) -> Result<FtpStream> {
        let mut stream = FtpStream::connect(self.address.as_str()).await.map_err(ftp_error)?;
        if let Err(e) = stream.login(&self.username, &self.password).await {
            let _ = stream.quit().await;
            return Err(Error::new(ErrorKind::Connectivity, e));
        }
        stream.transfer_type(FileType::Binary).await.map_err(ftp_error)?;
        Ok(stream)
    }
}

#[async_trait]
impl Connector for AsyncFtpConnector {
    type Session = FtpStream;

    #[tracing_attributes::instrument]
    async fn connect(&self) -> Result<FtpStream> {
        let stream = tokio::time::timeout(self.timeout, self.dial())
            .await
            .map_err(|_| Error::new(ErrorKind::Connectivity, format!("no connection within {:?}", self.timeout)))?
            .map_err(|e| e.context("connect", &self.address))?;
        tracing::debug!("ftp session established");
        Ok(stream)
    }
}

// Only the reply code is stable across servers, async_ftp puts it at the start of the
// response it quotes.
fn reply_code(message: &str) -> Option<u32> {
    let response = message.rsplit_once("response: ").map_or(message, |(_, r)| r);
    response.trim_start().get(..3)?.parse().ok()
}

/// Maps an [`FtpError`] onto the storage error kinds.
pub(crate) fn ftp_error(err: FtpError) -> Error {
    let kind = match &err {
        FtpError::ConnectionError(e) => match Error::from(std::io::Error::from(e.kind())).kind() {
            ErrorKind::LocalError => ErrorKind::Connectivity,
            kind => kind,
        },
        FtpError::InvalidResponse(message) => match reply_code(message) {
            Some(421) | Some(425) | Some(426) => ErrorKind::Connectivity,
            Some(530) | Some(532) => ErrorKind::PermissionDenied,
            Some(450) | Some(550) => ErrorKind::NotFound,
            Some(553) => ErrorKind::InvalidName,
            _ => ErrorKind::LocalError,
        },
        _ => ErrorKind::Connectivity,
    };
    Error::new(kind, err)
}

#[async_trait]
impl FtpSession for FtpStream {
    async fn noop(&mut self) -> Result<()> {
        FtpStream::noop(self).await.map_err(ftp_error)
    }

    async fn quit(&mut self) -> Result<()> {
        FtpStream::quit(self).await.map_err(ftp_error)
    }

    async fn list(&mut self, dir: &str) -> Result<Vec<String>> {
        let dir = if dir.is_empty() { None } else { Some(dir) };
        FtpStream::list(self, dir).await.map_err(ftp_error)
    }

    async fn mkdir(&mut self, dir: &str) -> Result<()> {
        FtpStream::mkdir(self, dir).await.map_err(ftp_error)
    }

    async fn rmdir(&mut self, dir: &str) -> Result<()> {
        FtpStream::rmdir(self, dir).await.map_err(ftp_error)
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        FtpStream::rm(self, path).await.map_err(ftp_error)
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        FtpStream::rename(self, from, to).await.map_err(ftp_error)
    }

    async fn store(&mut self, path: &str, mut content: Content) -> Result<()> {
        FtpStream::put(self, path, &mut content).await.map_err(ftp_error)
    }

    async fn retrieve(&mut self, path: &str) -> Result<Vec<u8>> {
        FtpStream::simple_retr(self, path).await.map(|cursor| cursor.into_inner()).map_err(ftp_error)
    }
}
