//! Named pipe creation.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::debug;

use crate::error::{Result, SessionError};

/// Mode for the camera source pipe.
pub const SOURCE_PIPE_MODE: u32 = 0o644;

/// Mode for other pipes, masked by the process umask.
pub const DEFAULT_PIPE_MODE: u32 = 0o666;

/// A FIFO in the session workspace.
///
/// Removal is left to the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipe {
    path: PathBuf,
}

impl Pipe {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Creates a FIFO at `path`, reusing one that already exists.
///
/// Fails if something other than a FIFO occupies the path or the directory
/// is not writable.
pub fn create_pipe(path: &Path, mode: u32) -> Result<Pipe> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => {
            debug!(path = %path.display(), "Reusing existing pipe");
            return Ok(Pipe {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {
            return Err(SessionError::resource(
                "pipe",
                path,
                io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a FIFO"),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(SessionError::resource("pipe", path, e)),
    }

    mkfifo(path, Mode::from_bits_truncate(mode as nix::libc::mode_t))
        .map_err(|e| SessionError::resource("pipe", path, io::Error::from(e)))?;

    debug!(path = %path.display(), mode = %format_args!("{mode:o}"), "Created pipe");
    Ok(Pipe {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera");
        let pipe = create_pipe(&path, SOURCE_PIPE_MODE).unwrap();
        assert_eq!(pipe.path(), path);
        assert!(fs::symlink_metadata(&path).unwrap().file_type().is_fifo());
    }

    #[test]
    fn test_existing_fifo_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview");
        create_pipe(&path, DEFAULT_PIPE_MODE).unwrap();
        assert!(create_pipe(&path, DEFAULT_PIPE_MODE).is_ok());
    }

    #[test]
    fn test_regular_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera");
        fs::write(&path, b"not a pipe").unwrap();

        let err = create_pipe(&path, SOURCE_PIPE_MODE).unwrap_err();
        assert!(matches!(err, SessionError::Resource { kind: "pipe", .. }));
    }

    #[test]
    fn test_mode_is_applied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera");
        create_pipe(&path, SOURCE_PIPE_MODE).unwrap();
        let mode = fs::symlink_metadata(&path).unwrap().permissions().mode();
        // Group and other write bits never appear, whatever the umask.
        assert_eq!(mode & 0o022, 0);
        assert_eq!(mode & 0o600, 0o600);
    }

    #[test]
    fn test_missing_directory_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("camera");
        let err = create_pipe(&path, SOURCE_PIPE_MODE).unwrap_err();
        assert!(matches!(err, SessionError::Resource { .. }));
    }
}
