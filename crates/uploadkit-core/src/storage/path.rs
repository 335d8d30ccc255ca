//! Canonical, back-end relative paths.
//!
//! Every path that crosses the [`Uploader`](crate::storage::Uploader) boundary is a canonical
//! path: relative to the back-end root, separated by forward slashes, without empty, `.` or `..`
//! segments. The root itself is the empty string.

use super::{Error, ErrorKind, Result};

/// Resolves `path` into its canonical form. Backslashes are treated as separators, a leading
/// slash is ignored and `..` segments are resolved lexically. A `..` that would climb above the
/// root is rejected.
pub fn canonicalize(path: &str) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::new(ErrorKind::InvalidName, "path escapes the storage root").context("resolve", path));
                }
            }
            s if s.contains('\0') => {
                return Err(Error::new(ErrorKind::InvalidName, "path contains a NUL character").context("resolve", path));
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Replaces every backslash with a forward slash. Used on paths reported by a back-end, which
/// are trusted not to escape but may carry platform separators.
pub fn forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Joins a canonical directory and a single entry name.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// The last segment of a canonical path.
pub fn file_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, name)) => name,
        None => path,
    }
}

/// Everything before the last segment of a canonical path, `""` for top level entries.
pub fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}

/// The lower-cased extension of the last segment, without the dot. Empty when there is none.
pub fn extension(path: &str) -> String {
    match file_name(path).rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// True when the canonical path denotes the back-end root.
pub fn is_root(path: &str) -> bool {
    path.is_empty()
}
