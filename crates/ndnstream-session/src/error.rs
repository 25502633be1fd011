//! Error types for the session runtime.
//!
//! Errors are grouped by the point at which a session can fail:
//! - `Setup` - bad parameters or external prerequisites, before any process runs
//! - `Resource` - workspace, pipe or file creation
//! - `Spawn` - a required child process could not be started
//!
//! Statistics parse problems are warnings (`ndnstream_core::ParseWarning`)
//! and teardown failures are only logged, so neither appears here.

use std::io;
use std::path::PathBuf;

use ndnstream_core::DomainError;
use ndnstream_libconf::LibconfError;
use thiserror::Error;

use crate::supervisor::Role;

/// Problems detected while preparing a session.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Invalid video size or publishing name
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The requested signing identity did not exist and could not be created
    #[error("failed to create identity {0}")]
    IdentityCreation(String),

    /// No identity was requested and the keychain has no default
    #[error("failed to acquire default identity. Set default identity using ndnsec")]
    NoDefaultIdentity,

    /// The identity tool could not be run
    #[error("identity tool {program} failed: {reason}")]
    IdentityTool { program: String, reason: String },

    /// The publisher configuration file could not be read
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The publisher configuration file is not valid libconfig
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: LibconfError,
    },

    /// The publisher configuration lacks a setting the session must change
    #[error("config file {path} has no usable {setting} setting")]
    ConfigShape { path: PathBuf, setting: String },

    /// The ndnstream settings file could not be loaded
    #[error("failed to load settings {path}: {reason}")]
    Settings { path: PathBuf, reason: String },
}

/// Session runtime errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Fatal problem found before any child process was spawned
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),

    /// Workspace entry could not be created
    #[error("failed to create {kind} {path}: {source}")]
    Resource {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A child process failed to start
    #[error("failed to start {role} ({program}): {source}")]
    Spawn {
        role: Role,
        program: String,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub(crate) fn resource(kind: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Resource {
            kind,
            path: path.into(),
            source,
        }
    }

    /// Returns true if the session failed before spawning anything.
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Setup(_))
    }
}

impl From<DomainError> for SessionError {
    fn from(err: DomainError) -> Self {
        Self::Setup(SetupError::Domain(err))
    }
}

/// Convenience Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_display() {
        let err: SessionError = DomainError::InvalidVideoSize {
            value: "1280".to_string(),
        }
        .into();
        assert!(err.is_setup());
        let display = err.to_string();
        assert!(display.contains("setup failed"));
        assert!(display.contains("1280"));
    }

    #[test]
    fn test_identity_errors_display() {
        let err = SessionError::from(SetupError::IdentityCreation("/ndn/alex".to_string()));
        assert!(err.to_string().contains("failed to create identity /ndn/alex"));

        let err = SessionError::from(SetupError::NoDefaultIdentity);
        assert!(err.to_string().contains("default identity"));
    }

    #[test]
    fn test_resource_error_display() {
        let err = SessionError::resource(
            "pipe",
            "/tmp/ws/camera",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_setup());
        assert_eq!(err.to_string(), "failed to create pipe /tmp/ws/camera: denied");
    }

    #[test]
    fn test_spawn_error_display() {
        let err = SessionError::Spawn {
            role: Role::Encoder,
            program: "ffmpeg".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "failed to start encoder (ffmpeg): not found");
    }
}
