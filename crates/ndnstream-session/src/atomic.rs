//! Whole-file replacement that readers never see half-written.

use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Replaces the content of `path` atomically.
///
/// The content goes to a temporary file in the same directory, is synced to
/// disk, then renamed over `path`. A reader opening `path` at any moment
/// sees either the previous content or `content` in full. On failure `path`
/// is left untouched and the temporary file is removed when dropped.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut temp = Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Async wrapper running [`write_atomic`] on the blocking pool.
pub async fn write_atomic_async(path: &Path, content: Vec<u8>) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &content))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}
