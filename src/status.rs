//! Per-recipient outcome collection for non-atomic body submission.

use ahash::AHashMap;

use crate::error::{DeliveryError, Result};

/// Write-only sink for per-recipient outcomes.
///
/// During non-atomic body submission a backend reports exactly one outcome
/// per added recipient. Recipients with no reported outcome are
/// pending/unknown.
pub trait StatusCollector: Send {
    /// Record the outcome for one recipient. `Ok(())` means delivered.
    fn set_status(&mut self, recipient: &str, outcome: Result<()>);
}

/// Map-backed collector, keyed by recipient address.
///
/// The protocol only requires the write side; the read side is exposed for
/// tests and for reporting per-recipient bounces to senders. Scoped to one
/// non-atomic submission call; [`clear`](Self::clear) before reuse.
#[derive(Debug, Default)]
pub struct MultiStatus {
    statuses: AHashMap<String, Result<()>>,
}

impl MultiStatus {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The outcome recorded for `recipient`, if any.
    #[must_use]
    pub fn get(&self, recipient: &str) -> Option<&Result<()>> {
        self.statuses.get(recipient)
    }

    /// Whether `recipient` was reported delivered.
    #[must_use]
    pub fn is_delivered(&self, recipient: &str) -> bool {
        matches!(self.statuses.get(recipient), Some(Ok(())))
    }

    /// Recipients with a failure outcome, in no particular order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &DeliveryError)> {
        self.statuses
            .iter()
            .filter_map(|(rcpt, outcome)| match outcome {
                Ok(()) => None,
                Err(err) => Some((rcpt.as_str(), err)),
            })
    }

    /// Number of recipients with a recorded outcome.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Whether no outcomes have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Discard all recorded outcomes.
    pub fn clear(&mut self) {
        self.statuses.clear();
    }
}

impl StatusCollector for MultiStatus {
    fn set_status(&mut self, recipient: &str, outcome: Result<()>) {
        self.statuses.insert(recipient.to_string(), outcome);
    }
}
