use crate::BoxError;
use derive_more::Display;
use std::fmt;
use thiserror::Error;

/// The Error returned by storage back-ends. Back-end implementations should choose the
/// [`ErrorKind`] carefully since callers branch on it, while the display string is what ends up
/// in front of the user.
#[derive(Debug, Error)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates a new storage error
    pub fn new<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error {
            kind,
            context: None,
            source: Some(error.into()),
        }
    }

    /// Attaches the operation and path the error occurred for, e.g. `("rename", "a/b.png")`.
    /// An existing context is kept so that the innermost, most specific one wins.
    pub fn context(mut self, operation: &str, path: &str) -> Error {
        if self.context.is_none() {
            self.context = Some(format!("{} {}", operation, path));
        }
        self
    }

    /// What went wrong, in terms callers can act on.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Attempts to get a reference to the inner `std::io::Error` if there is one.
    pub fn get_io_error(&self) -> Option<&std::io::Error> {
        self.source.as_ref()?.downcast_ref::<std::io::Error>()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage error: {}", self.kind)?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            kind,
            context: None,
            source: None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => ErrorKind::Conflict,
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof => ErrorKind::Connectivity,
            _ => ErrorKind::LocalError,
        };
        Error::new(kind, err)
    }
}

/// The `ErrorKind` variants that can be produced by the [`Uploader`] implementations.
///
/// [`Uploader`]: crate::storage::Uploader
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ErrorKind {
    /// Unknown engine name or a missing/invalid setting. Raised at construction and never
    /// retried.
    #[display("configuration error")]
    Configuration,
    /// The target path or directory does not exist.
    #[display("no such file or directory")]
    NotFound,
    /// Dialing, authenticating or talking to the remote side failed. The FTP back-end heals
    /// these through its keep-alive task; the others surface them per call.
    #[display("connection error")]
    Connectivity,
    /// The destination already exists and the caller did not ask for it to be overwritten.
    #[display("file already exists")]
    Conflict,
    /// The path contains characters that are not allowed or climbs above the storage root.
    #[display("file name not allowed")]
    InvalidName,
    /// A file operation was attempted on a directory.
    #[display("is a directory")]
    IsADirectory,
    /// The back-end refused access.
    #[display("permission denied")]
    PermissionDenied,
    /// The operation did not complete within its deadline.
    #[display("operation timed out")]
    Timeout,
    /// Any other failure inside the back-end.
    #[display("local error")]
    LocalError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_includes_context_and_source() {
        let err = Error::new(ErrorKind::NotFound, "550 No such file").context("remove", "a/b.png");
        assert_eq!(err.to_string(), "storage error: no such file or directory (remove a/b.png): 550 No such file");
    }

    #[test]
    fn innermost_context_wins() {
        let err = Error::from(ErrorKind::Timeout).context("stor", "x").context("upload", "y");
        assert_eq!(err.to_string(), "storage error: operation timed out (stor x)");
    }

    #[test]
    fn io_errors_map_to_kinds() {
        let not_found: Error = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert!(not_found.get_io_error().is_some());

        let exists: Error = std::io::Error::from(std::io::ErrorKind::AlreadyExists).into();
        assert_eq!(exists.kind(), ErrorKind::Conflict);

        let reset: Error = std::io::Error::from(std::io::ErrorKind::ConnectionReset).into();
        assert_eq!(reset.kind(), ErrorKind::Connectivity);

        let other: Error = std::io::Error::other("boom").into();
        assert_eq!(other.kind(), ErrorKind::LocalError);
    }
}
