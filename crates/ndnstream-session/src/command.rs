//! Command dispatch.
//!
//! Each command the binary accepts is a [`CommandRequest`] variant and
//! [`build`] maps it to the object that runs it.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::identity::{IdentityStore, Ndnsec};
use crate::session::{PublishOptions, PublishSession, SessionReport};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Publish,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved command with its parameters.
#[derive(Debug, Clone)]
pub enum CommandRequest {
    Publish(PublishOptions),
}

impl CommandRequest {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Publish(_) => CommandKind::Publish,
        }
    }
}

/// A runnable command.
#[async_trait]
pub trait SessionCommand: Send {
    fn kind(&self) -> CommandKind;

    /// Runs to completion; cancelling `shutdown` asks the command to stop.
    async fn execute(self: Box<Self>, shutdown: CancellationToken) -> Result<SessionReport>;
}

#[async_trait]
impl<S: IdentityStore + 'static> SessionCommand for PublishSession<S> {
    fn kind(&self) -> CommandKind {
        CommandKind::Publish
    }

    async fn execute(self: Box<Self>, shutdown: CancellationToken) -> Result<SessionReport> {
        (*self).run(shutdown).await
    }
}

/// Creates the handler for `request`.
pub fn build(request: CommandRequest, settings: Settings) -> Box<dyn SessionCommand> {
    match request {
        CommandRequest::Publish(options) => {
            let identities = Ndnsec::new(settings.tools.ndnsec.clone());
            Box::new(PublishSession::new(settings, options, identities))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_publish() {
        let request = CommandRequest::Publish(PublishOptions::default());
        assert_eq!(request.kind(), CommandKind::Publish);

        let command = build(request, Settings::default());
        assert_eq!(command.kind(), CommandKind::Publish);
        assert_eq!(command.kind().to_string(), "publish");
    }
}
