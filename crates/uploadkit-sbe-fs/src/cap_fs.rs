//! A capabilities-friendly workalike of tokio::fs
// The blocking cap_std calls are moved onto the blocking pool the same way tokio::fs does it.

use std::{io, path::Path, sync::Arc};

use tokio::task::spawn_blocking;

/// Runs `f` on the blocking pool and flattens a failed join into an io error.
async fn asyncify<F, T>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match spawn_blocking(f).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::other("background task failed")),
    }
}

/// Recursively create a directory and all of its missing parents somewhere under this one.
pub async fn create_dir_all<P: AsRef<Path>>(root: Arc<cap_std::fs::Dir>, path: P) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.create_dir_all(path)).await
}

pub async fn open_with<P: AsRef<Path>>(root: Arc<cap_std::fs::Dir>, path: P, options: cap_std::fs::OpenOptions) -> io::Result<cap_std::fs::File> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.open_with(path, &options)).await
}

/// Reads the entire contents of a file into a bytes vector.
pub async fn read<P: AsRef<Path>>(root: Arc<cap_std::fs::Dir>, path: P) -> io::Result<Vec<u8>> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.read(path)).await
}

/// Returns the names of the entries within a directory together with their metadata, following
/// symbolic links that stay inside the root. Entries whose metadata cannot be read are reported
/// as errors next to the readable ones so the caller decides what to do with them.
pub async fn read_dir<P: AsRef<Path>>(root: Arc<cap_std::fs::Dir>, path: P) -> io::Result<Vec<(String, io::Result<cap_std::fs::Metadata>)>> {
    let path = path.as_ref().to_owned();
    asyncify(move || {
        let mut entries = Vec::new();
        for entry in root.read_dir(&path)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            let meta = root.metadata(path.join(&name));
            entries.push((name, meta));
        }
        Ok(entries)
    })
    .await
}

/// Removes a directory after removing all its contents.
pub async fn remove_dir_all(root: Arc<cap_std::fs::Dir>, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.remove_dir_all(path)).await
}

/// Removes a file from the filesystem.
///
/// This is a capabilities-based, async version of [`std::fs::remove_file`][std]
///
/// [std]: std::fs::remove_file
pub async fn remove_file(root: Arc<cap_std::fs::Dir>, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.remove_file(path)).await
}

/// Renames a file or directory to a new name, replacing the original file if
/// `to` already exists.
///
/// This is a capabilities-based async version of
/// [`std::fs::rename`](std::fs::rename)
pub async fn rename(root: Arc<cap_std::fs::Dir>, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
    let from = from.as_ref().to_owned();
    let to = to.as_ref().to_owned();

    asyncify(move || root.rename(from, &root, to)).await
}

/// Queries the file system metadata for a path, following symbolic links.
pub async fn metadata<P: AsRef<Path>>(root: Arc<cap_std::fs::Dir>, path: P) -> io::Result<cap_std::fs::Metadata> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.metadata(path)).await
}
