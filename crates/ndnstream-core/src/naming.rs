//! NDN names used by a publishing session.

use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Full prefix under which a stream is published.
///
/// Composed as `<base>/<instance>/<stream>`, e.g.
/// `/ndn/edu/ucla/alex/ndnrtc-client/camera`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublishingPrefix {
    base: String,
    instance: String,
    stream: String,
}

impl PublishingPrefix {
    /// Builds a prefix from its components.
    ///
    /// Surrounding whitespace and trailing slashes on the base are removed.
    pub fn new(base: &str, instance: &str, stream: &str) -> DomainResult<Self> {
        let base = base.trim().trim_end_matches('/');
        let instance = instance.trim().trim_matches('/');
        let stream = stream.trim().trim_matches('/');

        for (field, value) in [("prefix", base), ("instance name", instance), ("stream name", stream)] {
            if value.is_empty() {
                return Err(DomainError::EmptyName {
                    field: field.to_string(),
                });
            }
        }

        let base = if base.starts_with('/') {
            base.to_string()
        } else {
            format!("/{base}")
        };

        Ok(Self {
            base,
            instance: instance.to_string(),
            stream: stream.to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// The `<base>/<instance>` part the publisher registers.
    pub fn client_prefix(&self) -> String {
        format!("{}/{}", self.base, self.instance)
    }
}

impl fmt::Display for PublishingPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.base, self.instance, self.stream)
    }
}

/// Name of the statistics file the publisher writes into its log path.
///
/// Format: `<statFileId>-<identity>-<instance>-<stream>.stat`, with `/` in
/// the identity encoded as `%2F`.
pub fn stat_file_name(stat_file_id: &str, identity: &str, instance: &str, stream: &str) -> String {
    let identity = identity.trim().replace('/', "%2F");
    format!("{stat_file_id}-{identity}-{instance}-{stream}.stat")
}

/// Escapes text for the player's drawtext expansion.
///
/// `%` starts an expansion sequence there, so literal ones are written `\%`.
pub fn escape_overlay_text(text: &str) -> String {
    text.replace('%', "\\%")
}
