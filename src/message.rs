//! Message identity and envelope metadata.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Opaque message identifier.
///
/// A fixed-length hexadecimal digest derived deterministically from a
/// caller-supplied name, so repeated derivations from the same name yield the
/// same ID. Collision-free within a benchmark run; not a security property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Derive an ID from a name.
    #[must_use]
    pub fn derive(name: &str) -> Self {
        let digest = Sha1::digest(name.as_bytes());
        Self(hex::encode(digest))
    }

    /// The hexadecimal digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope metadata for one message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMetadata {
    /// Stable message identifier.
    pub id: MessageId,
    /// Whether the sender's identity should be omitted from trace headers.
    pub dont_trace_sender: bool,
}

impl MsgMetadata {
    /// Metadata for synthetic benchmark traffic: the ID is derived from `name`
    /// and sender tracing is always suppressed.
    #[must_use]
    pub fn synthetic(name: &str) -> Self {
        Self {
            id: MessageId::derive(name),
            dont_trace_sender: true,
        }
    }
}
