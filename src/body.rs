//! Immutable, re-readable message body buffer.

use std::sync::Arc;

/// A message body: an immutable byte sequence that can be read any number of
/// times without mutation.
///
/// Clones share the underlying allocation, so one body is safely reused
/// across many concurrent transaction attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    data: Arc<[u8]>,
}

impl Body {
    /// Wrap a byte buffer.
    #[must_use]
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// A filler body of `len` repeated `b'a'` bytes.
    #[must_use]
    pub fn filler(len: usize) -> Self {
        Self::new(vec![b'a'; len])
    }

    /// The body contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Body length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Body {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Body {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}
