//! Signing identity lookup and creation.
//!
//! The keychain is managed by an external tool (`ndnsec`). The session only
//! needs to know whether an identity exists, to create a self-signed one,
//! and to read the default identity.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, SetupError};

/// Access to the signing keychain.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn exists(&self, identity: &str) -> Result<bool>;

    /// Creates a self-signed identity. Returns false if the tool refused.
    async fn create(&self, identity: &str) -> Result<bool>;

    /// The keychain default identity, or `None` when none is set.
    async fn default_identity(&self) -> Result<Option<String>>;
}

/// [`IdentityStore`] backed by the `ndnsec` command line tool.
#[derive(Debug, Clone)]
pub struct Ndnsec {
    program: String,
}

impl Ndnsec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(program = %self.program, ?args, "Running identity tool");
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SetupError::IdentityTool {
                    program: self.program.clone(),
                    reason: e.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl IdentityStore for Ndnsec {
    async fn exists(&self, identity: &str) -> Result<bool> {
        let output = self.run(&["list"]).await?;
        if !output.status.success() {
            return Err(SetupError::IdentityTool {
                program: self.program.clone(),
                reason: format!("list exited with {}", output.status),
            }
            .into());
        }
        Ok(list_contains(&String::from_utf8_lossy(&output.stdout), identity))
    }

    async fn create(&self, identity: &str) -> Result<bool> {
        let output = self.run(&["key-gen", "-t", "r", identity]).await?;
        if !output.status.success() {
            debug!(
                identity,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Identity creation failed"
            );
        }
        Ok(output.status.success())
    }

    async fn default_identity(&self) -> Result<Option<String>> {
        let output = self.run(&["get-default"]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let identity = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(identity).filter(|id| !id.is_empty()))
    }
}

/// Checks `ndnsec list` output for an identity. The default is marked `*`.
fn list_contains(listing: &str, identity: &str) -> bool {
    listing
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .any(|name| name == identity)
}

/// Picks the identity that signs published data.
///
/// A requested identity is created when missing. Without a request the
/// keychain default is used.
pub async fn resolve_signing_identity(store: &dyn IdentityStore, requested: Option<&str>) -> Result<String> {
    let requested = requested.map(str::trim).filter(|id| !id.is_empty());

    match requested {
        Some(identity) => {
            if store.exists(identity).await? {
                debug!(identity, "Signing identity exists");
            } else if store.create(identity).await? {
                info!(identity, "Created self-signed identity");
            } else {
                return Err(SetupError::IdentityCreation(identity.to_string()).into());
            }
            Ok(identity.to_string())
        }
        None => store
            .default_identity()
            .await?
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SetupError::NoDefaultIdentity.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        known: Mutex<Vec<String>>,
        can_create: bool,
        default: Option<String>,
    }

    #[async_trait]
    impl IdentityStore for FakeStore {
        async fn exists(&self, identity: &str) -> Result<bool> {
            Ok(self.known.lock().unwrap().iter().any(|id| id == identity))
        }

        async fn create(&self, identity: &str) -> Result<bool> {
            if self.can_create {
                self.known.lock().unwrap().push(identity.to_string());
            }
            Ok(self.can_create)
        }

        async fn default_identity(&self) -> Result<Option<String>> {
            Ok(self.default.clone())
        }
    }

    #[test]
    fn test_list_contains() {
        let listing = "* /ndn/edu/ucla/alex\n  /ndn/test\n";
        assert!(list_contains(listing, "/ndn/edu/ucla/alex"));
        assert!(list_contains(listing, "/ndn/test"));
        assert!(!list_contains(listing, "/ndn"));
    }

    #[tokio::test]
    async fn test_existing_identity_is_used() {
        let store = FakeStore {
            known: Mutex::new(vec!["/ndn/alex".to_string()]),
            ..Default::default()
        };
        let identity = resolve_signing_identity(&store, Some(" /ndn/alex ")).await.unwrap();
        assert_eq!(identity, "/ndn/alex");
    }

    #[tokio::test]
    async fn test_missing_identity_is_created() {
        let store = FakeStore {
            can_create: true,
            ..Default::default()
        };
        let identity = resolve_signing_identity(&store, Some("/ndn/new")).await.unwrap();
        assert_eq!(identity, "/ndn/new");
        assert!(store.exists("/ndn/new").await.unwrap());
    }

    #[tokio::test]
    async fn test_creation_failure_is_setup_error() {
        let store = FakeStore::default();
        let err = resolve_signing_identity(&store, Some("/ndn/new")).await.unwrap_err();
        assert!(matches!(err, SessionError::Setup(SetupError::IdentityCreation(ref id)) if id == "/ndn/new"));
    }

    #[tokio::test]
    async fn test_default_identity() {
        let store = FakeStore {
            default: Some("/ndn/default\n".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_signing_identity(&store, None).await.unwrap(), "/ndn/default");
    }

    #[tokio::test]
    async fn test_empty_default_is_setup_error() {
        let store = FakeStore {
            default: Some("  ".to_string()),
            ..Default::default()
        };
        let err = resolve_signing_identity(&store, Some("")).await.unwrap_err();
        assert!(matches!(err, SessionError::Setup(SetupError::NoDefaultIdentity)));
    }

    #[tokio::test]
    async fn test_missing_tool_is_setup_error() {
        let store = Ndnsec::new("/nonexistent/ndnsec");
        let err = store.default_identity().await.unwrap_err();
        assert!(matches!(err, SessionError::Setup(SetupError::IdentityTool { .. })));
    }
}
