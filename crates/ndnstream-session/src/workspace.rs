//! Per-session scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// FIFO the encoder writes and the publisher reads.
pub const CAMERA_PIPE: &str = "camera";
/// FIFO the encoder writes and the player reads.
pub const PREVIEW_PIPE: &str = "preview";
pub const OVERLAY_FILE: &str = "overlay.txt";
pub const PRODUCER_CONFIG_FILE: &str = "producer.cfg";
pub const POLICY_FILE: &str = "policy.conf";

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "ndnstream-";

/// Exclusively owned directory holding one session's pipes, configs and logs.
///
/// Removed on [`Workspace::close`] (or drop) unless `keep` is set.
#[derive(Debug)]
pub struct Workspace {
    root: Root,
}

#[derive(Debug)]
enum Root {
    /// Removed when dropped.
    Owned(TempDir),
    /// Left on disk.
    Kept(PathBuf),
}

impl Workspace {
    /// Creates a fresh directory `ndnstream-<random>` under `base`.
    pub fn create(base: &Path, keep: bool) -> Result<Self> {
        fs::create_dir_all(base).map_err(|e| SessionError::resource("workspace", base, e))?;

        let dir = Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(base)
            .map_err(|e| SessionError::resource("workspace", base, e))?;
        debug!(path = %dir.path().display(), keep, "Created workspace");

        let root = if keep {
            Root::Kept(dir.keep())
        } else {
            Root::Owned(dir)
        };
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        match &self.root {
            Root::Owned(dir) => dir.path(),
            Root::Kept(path) => path.as_path(),
        }
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    pub fn camera_pipe(&self) -> PathBuf {
        self.join(CAMERA_PIPE)
    }

    pub fn preview_pipe(&self) -> PathBuf {
        self.join(PREVIEW_PIPE)
    }

    pub fn overlay_file(&self) -> PathBuf {
        self.join(OVERLAY_FILE)
    }

    pub fn producer_config(&self) -> PathBuf {
        self.join(PRODUCER_CONFIG_FILE)
    }

    pub fn policy_file(&self) -> PathBuf {
        self.join(POLICY_FILE)
    }

    /// Log sink for one of a child's output streams, e.g. `ffmpeg.err`.
    pub fn log_sink(&self, program: &str, stream: &str) -> PathBuf {
        self.join(&format!("{program}.{stream}"))
    }

    pub fn keep(&self) -> bool {
        matches!(self.root, Root::Kept(_))
    }

    /// Removes the directory, or logs where it was kept.
    ///
    /// Returns the path when the workspace was kept.
    pub fn close(self) -> Option<PathBuf> {
        match self.root {
            Root::Kept(path) => {
                info!(path = %path.display(), "Keeping workspace");
                Some(path)
            }
            Root::Owned(dir) => {
                let path = dir.path().to_path_buf();
                match dir.close() {
                    Ok(()) => debug!(path = %path.display(), "Removed workspace"),
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove workspace"),
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_close() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path(), false).unwrap();
        let root = workspace.path().to_path_buf();

        assert!(root.is_dir());
        assert!(root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
            .starts_with(WORKSPACE_PREFIX));
        assert_eq!(workspace.camera_pipe(), root.join("camera"));
        assert_eq!(workspace.log_sink("ffplay", "err"), root.join("ffplay.err"));

        assert_eq!(workspace.close(), None);
        assert!(!root.exists());
    }

    #[test]
    fn test_two_workspaces_do_not_collide() {
        let base = tempfile::tempdir().unwrap();
        let first = Workspace::create(base.path(), false).unwrap();
        let second = Workspace::create(base.path(), false).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_keep_survives_close_and_drop() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path(), true).unwrap();
        let root = workspace.path().to_path_buf();
        assert_eq!(workspace.close(), Some(root.clone()));
        assert!(root.is_dir());
    }

    #[test]
    fn test_kept_workspace_survives_drop() {
        let base = tempfile::tempdir().unwrap();
        let root = {
            let workspace = Workspace::create(base.path(), true).unwrap();
            assert!(workspace.keep());
            workspace.path().to_path_buf()
        };
        assert!(root.is_dir());
    }

    #[test]
    fn test_missing_base_is_created() {
        let base = tempfile::tempdir().unwrap();
        let nested = base.path().join("a").join("b");
        let workspace = Workspace::create(&nested, false).unwrap();
        assert!(workspace.path().starts_with(&nested));
        assert!(!workspace.keep());
    }

    #[test]
    fn test_drop_removes() {
        let base = tempfile::tempdir().unwrap();
        let root = {
            let workspace = Workspace::create(base.path(), false).unwrap();
            fs::write(workspace.overlay_file(), "publishing /a\n").unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!root.exists());
    }
}
