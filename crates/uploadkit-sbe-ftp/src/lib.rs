//! An uploadkit [`Uploader`] that stores files on an FTP server.
//!
//! The back-end holds a single authenticated control connection. Operations take turns on it:
//! a mutex around the session makes sure only one command sequence is on the wire at any time.
//! A background task probes the connection with `NOOP` every few seconds and replaces it with
//! a new one when the probe fails, so a dropped connection heals without the caller noticing
//! more than the operations that ran into it.
//!
//! ```no_run
//! use uploadkit_core::storage::Uploader;
//! use uploadkit_sbe_ftp::{FtpUploader, options::FtpOptions};
//!
//! # async fn run() -> uploadkit_core::storage::Result<()> {
//! let ftp = FtpUploader::connect(FtpOptions::new("ftp.example.com", "bob", "secret")).await?;
//! ftp.upload("a/b/c.png", &b"\x89PNG"[..]).await?;
//! ftp.close().await?;
//! # Ok(())
//! # }
//! ```

mod listing;
pub mod options;
pub mod session;

pub use listing::{EntryType, RemoteEntry};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use options::FtpOptions;
use session::{AsyncFtpConnector, Connector, Content, FtpSession};
use std::{fmt, future::Future, sync::Arc, time::Duration};
use tokio::{io::AsyncRead, sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uploadkit_core::storage::{self, Error, ErrorKind, File, Result, Uploader, path};

/// The name this back-end is selected by.
pub const ENGINE_NAME: &str = "ftp";

// The connection state shared with the keep-alive task. `session` is `None` while the
// connection is down or after it was closed.
struct State<S> {
    session: Option<S>,
    closed: bool,
}

impl<S> State<S> {
    fn session(&mut self) -> Result<&mut S> {
        if self.closed {
            return Err(Error::new(ErrorKind::Connectivity, "the ftp session was closed"));
        }
        self.session
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Connectivity, "not connected, waiting for the keep-alive to reconnect"))
    }

    // A command sequence that ran out of time may still have replies underway, so the
    // connection cannot be trusted anymore.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(&result, Err(e) if e.kind() == ErrorKind::Timeout) {
            tracing::warn!("ftp operation timed out, dropping the session");
            self.session = None;
        }
        result
    }
}

struct Inner<C: Connector> {
    connector: C,
    state: Mutex<State<C::Session>>,
    // How long a NOOP may go unanswered before the connection counts as dead.
    noop_timeout: Duration,
}

impl<C: Connector> Inner<C> {
    async fn health_check(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            match deadline(Some(self.noop_timeout), session.noop()).await {
                Ok(()) => return,
                Err(e) => tracing::warn!(error = %e, "ftp keep-alive failed, reconnecting"),
            }
        }
        state.session = None;
        match self.connector.connect().await {
            Ok(session) => {
                state.session = Some(session);
                tracing::info!("ftp session re-established");
            }
            Err(e) => tracing::error!(error = %e, "ftp reconnect failed, retrying on the next tick"),
        }
    }
}

async fn keepalive<C: Connector>(inner: Arc<Inner<C>>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => inner.health_check().await,
        }
    }
    tracing::debug!("ftp keep-alive stopped");
}

async fn deadline<T>(limit: Option<Duration>, operation: impl Future<Output = Result<T>>) -> Result<T> {
    match limit {
        None => operation.await,
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .unwrap_or_else(|_| Err(Error::new(ErrorKind::Timeout, format!("no reply within {:?}", limit)))),
    }
}

// Runs `$body` with the session locked. `$s` is bound to the session for the duration.
macro_rules! locked {
    ($self:ident, $s:ident => $body:expr) => {{
        let mut state = $self.inner.state.lock().await;
        let result = match state.session() {
            Ok($s) => deadline($self.operation_timeout, $body).await,
            Err(e) => Err(e),
        };
        state.settle(result)
    }};
}

/// Stores files on an FTP server, relative to the directory the configured user logs in to.
pub struct FtpUploader<C: Connector = AsyncFtpConnector> {
    inner: Arc<Inner<C>>,
    cancel: CancellationToken,
    keepalive: Mutex<Option<JoinHandle<()>>>,
    operation_timeout: Option<Duration>,
    url_prefix: Option<String>,
    site_url: String,
}

impl<C: Connector> fmt::Debug for FtpUploader<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpUploader")
            .field("connector", &self.inner.connector)
            .field("operation_timeout", &self.operation_timeout)
            .field("url_prefix", &self.url_prefix)
            .finish()
    }
}

impl FtpUploader {
    /// Connects to the server described by `options`. Failing to connect or log in is fatal
    /// here; once constructed, connection loss is dealt with by the keep-alive task.
    pub async fn connect(options: FtpOptions) -> Result<Self> {
        Self::with_connector(AsyncFtpConnector::from(&options), &options).await
    }
}

impl<C: Connector> FtpUploader<C> {
    /// Like [`FtpUploader::connect`] but with sessions coming from `connector`. Must be
    /// called from within a Tokio runtime since it spawns the keep-alive task.
    pub async fn with_connector(connector: C, options: &FtpOptions) -> Result<Self> {
        let session = connector.connect().await?;
        let inner = Arc::new(Inner {
            connector,
            state: Mutex::new(State {
                session: Some(session),
                closed: false,
            }),
            noop_timeout: options.operation_timeout.unwrap_or(options.connect_timeout),
        });
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(keepalive(inner.clone(), options.keepalive_interval, cancel.clone()));
        Ok(FtpUploader {
            inner,
            cancel,
            keepalive: Mutex::new(Some(handle)),
            operation_timeout: options.operation_timeout,
            url_prefix: options.url_prefix.clone(),
            site_url: options.site_url.clone(),
        })
    }

    /// Runs one keep-alive check right away: sends `NOOP` and reconnects when that fails or
    /// gets no reply within the operation timeout (the connect timeout when there is none).
    /// The background task calls this on every tick.
    pub async fn health_check(&self) {
        self.inner.health_check().await
    }
}

impl<C: Connector> Drop for FtpUploader<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn to_file(dir: &str, entry: RemoteEntry) -> File {
    let path = path::join(dir, &entry.name);
    let mtime = entry.modified.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    if entry.is_dir() {
        File::directory(path, mtime)
    } else {
        File::file(path, entry.size, mtime)
    }
}

async fn list_dir<S: FtpSession>(session: &mut S, dir: &str) -> Result<Vec<RemoteEntry>> {
    let lines = session.list(dir).await?;
    Ok(listing::parse_listing(&lines, Utc::now()))
}

// Many servers answer LIST of a missing path with an empty listing and LIST of a file with
// that file's own line, so the directory is looked up in its parent first.
async fn read_dir<S: FtpSession>(session: &mut S, dir: &str) -> Result<Vec<RemoteEntry>> {
    if !path::is_root(dir) {
        match stat(session, dir).await? {
            None => return Err(ErrorKind::NotFound.into()),
            Some(entry) if !entry.is_dir() => return Err(Error::new(ErrorKind::LocalError, "not a directory")),
            Some(_) => {}
        }
    }
    list_dir(session, dir).await
}

// Looks `path` up in the listing of its parent. A missing parent means a missing entry.
async fn stat<S: FtpSession>(session: &mut S, path: &str) -> Result<Option<RemoteEntry>> {
    if path::is_root(path) {
        return Ok(Some(RemoteEntry {
            name: String::new(),
            size: 0,
            kind: EntryType::Folder,
            modified: None,
        }));
    }
    let name = path::file_name(path);
    match list_dir(session, path::parent(path)).await {
        Ok(entries) => Ok(entries.into_iter().find(|e| e.name == name)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// Creates `dir` one segment at a time. A segment that fails to be created is fine as long as
// it turns out to exist as a directory; otherwise the error for that segment is returned.
async fn make_dirs<S: FtpSession>(session: &mut S, dir: &str) -> Result<()> {
    let mut current = String::new();
    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        current = path::join(&current, segment);
        if let Err(e) = session.mkdir(&current).await {
            match stat(session, &current).await? {
                Some(entry) if entry.is_dir() => continue,
                _ => return Err(e.context("mkdir", &current)),
            }
        }
    }
    Ok(())
}

// Deletes the files and then the directories below `dir`, deepest first.
async fn remove_tree<S: FtpSession>(session: &mut S, dir: &str) -> Result<()> {
    let mut pending = vec![dir.to_string()];
    let mut dirs = Vec::new();
    while let Some(current) = pending.pop() {
        for entry in list_dir(session, &current).await? {
            let child = path::join(&current, &entry.name);
            if entry.is_dir() {
                pending.push(child);
            } else {
                session.delete(&child).await.map_err(|e| e.context("delete", &child))?;
            }
        }
        dirs.push(current);
    }
    // Parents are always recorded before their children.
    for dir in dirs.iter().rev() {
        session.rmdir(dir).await.map_err(|e| e.context("rmdir", dir))?;
    }
    Ok(())
}

async fn store<S: FtpSession>(session: &mut S, path: &str, content: Content) -> Result<()> {
    let parent = path::parent(path);
    if !path::is_root(parent) {
        make_dirs(session, parent).await?;
    }
    session.store(path, content).await
}

async fn remove<S: FtpSession>(session: &mut S, path: &str) -> Result<()> {
    match stat(session, path).await? {
        None => Err(ErrorKind::NotFound.into()),
        Some(entry) if entry.is_dir() => Err(ErrorKind::IsADirectory.into()),
        Some(_) => session.delete(path).await,
    }
}

async fn remove_dir<S: FtpSession>(session: &mut S, path: &str) -> Result<()> {
    match stat(session, path).await? {
        None => Err(ErrorKind::NotFound.into()),
        Some(entry) if !entry.is_dir() => Err(Error::new(ErrorKind::LocalError, "not a directory")),
        Some(_) => remove_tree(session, path).await,
    }
}

async fn rename<S: FtpSession>(session: &mut S, from: &str, to: &str) -> Result<()> {
    if stat(session, from).await?.is_none() {
        return Err(ErrorKind::NotFound.into());
    }
    session.rename(from, to).await
}

#[async_trait]
impl<C: Connector> Uploader for FtpUploader<C> {
    fn engine_name(&self) -> &str {
        ENGINE_NAME
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
        let content: Content = Box::new(content);
        locked!(self, s => store(s, &path, content)).map_err(|e| e.context("upload", &path))?;
        tracing::debug!("stored");
        Ok(path)
    }

    #[tracing_attributes::instrument]
    async fn list(&self, dir: &str) -> Result<Vec<File>> {
        let dir = path::canonicalize(dir)?;
        let entries = locked!(self, s => read_dir(s, &dir)).map_err(|e| e.context("list", &dir))?;
        Ok(entries.into_iter().map(|e| to_file(&dir, e)).collect())
    }

    #[tracing_attributes::instrument]
    async fn info(&self, path: &str) -> Result<File> {
        let path = path::canonicalize(path)?;
        match locked!(self, s => stat(s, &path)).map_err(|e| e.context("info", &path))? {
            Some(entry) if path::is_root(&path) => Ok(to_file("", entry)),
            Some(entry) => Ok(to_file(path::parent(&path), entry)),
            None => Err(Error::from(ErrorKind::NotFound).context("info", &path)),
        }
    }

    #[tracing_attributes::instrument]
    async fn remove(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        locked!(self, s => remove(s, &path)).map_err(|e| e.context("remove", &path))
    }

    #[tracing_attributes::instrument]
    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        locked!(self, s => make_dirs(s, &path)).map_err(|e| e.context("mkdir", &path))
    }

    #[tracing_attributes::instrument]
    async fn rmdir(&self, path: &str) -> Result<()> {
        let path = path::canonicalize(path)?;
        if path::is_root(&path) {
            return Err(Error::new(ErrorKind::PermissionDenied, "refusing to remove the storage root").context("rmdir", &path));
        }
        locked!(self, s => remove_dir(s, &path)).map_err(|e| e.context("rmdir", &path))
    }

    #[tracing_attributes::instrument]
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = path::canonicalize(from)?;
        let to = path::canonicalize(to)?;
        if path::is_root(&from) || path::is_root(&to) {
            return Err(Error::new(ErrorKind::InvalidName, "cannot rename the storage root").context("rename", &from));
        }
        locked!(self, s => rename(s, &from, &to)).map_err(|e| e.context("rename", &from))
    }

    #[tracing_attributes::instrument]
    async fn content(&self, path: &str) -> Result<Vec<u8>> {
        let path = path::canonicalize(path)?;
        locked!(self, s => s.retrieve(&path)).map_err(|e| e.context("content", &path))
    }

    #[tracing_attributes::instrument]
    async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        if let Some(handle) = self.keepalive.lock().await.take() {
            let _ = handle.await;
        }
        let mut state = self.inner.state.lock().await;
        state.closed = true;
        if let Some(mut session) = state.session.take() {
            session.quit().await.map_err(|e| e.context("quit", ""))?;
            tracing::info!("ftp session closed");
        }
        Ok(())
    }
}
