//! The delivery transaction protocol.
//!
//! A [`DeliveryTarget`] is any backend that can accept a message handoff: a
//! local mailbox store, a remote relay, a pipe to a process. Starting a
//! transaction yields a [`Delivery`], a single mutable unit of work owned
//! exclusively by its caller until it reaches exactly one terminal outcome.
//! The terminal calls consume the transaction, so no operation can follow a
//! commit or abort, and backends release reserved resources on every exit
//! path.
//!
//! Backends that can isolate per-recipient failures additionally implement
//! [`PartialDelivery`]; callers discover this at runtime through
//! [`Delivery::partial`] rather than assuming it.

use async_trait::async_trait;

use crate::{
    body::Body, error::Result, header::Header, message::MsgMetadata, status::StatusCollector,
};

/// A delivery backend that the harness can start transactions against.
///
/// Multiple transactions may be in flight concurrently from different
/// callers; a backend must not let one transaction's state leak into
/// another's.
#[async_trait]
pub trait DeliveryTarget: Send + Sync + std::fmt::Debug {
    /// Begin a transaction bound to one sender.
    ///
    /// The backend may reserve resources (a storage slot, a queue entry) that
    /// the returned transaction releases on commit or abort.
    ///
    /// # Errors
    /// If the backend cannot accept a transaction, e.g. resource exhaustion
    /// or an invalid sender. No cleanup is owed on failure.
    async fn start(&self, metadata: &MsgMetadata, sender: &str) -> Result<Box<dyn Delivery>>;
}

/// One in-flight message handoff.
///
/// Operations on a single transaction are sequential: the owner drives it
/// through `add_rcpt` and `body` and finishes with exactly one of `commit` or
/// `abort`. The terminal methods take the transaction by value to make a
/// second terminal call unrepresentable.
#[async_trait]
pub trait Delivery: Send {
    /// Add one recipient. May be called multiple times; insertion order is
    /// significant for later per-recipient result reporting.
    ///
    /// # Errors
    /// [`DeliveryError::RecipientRejected`](crate::DeliveryError::RecipientRejected)
    /// if this recipient is invalid or denied. The transaction remains usable:
    /// the caller may keep adding other recipients or abort.
    async fn add_rcpt(&mut self, recipient: &str) -> Result<()>;

    /// Deliver the body to all previously added recipients as one
    /// all-or-nothing operation.
    ///
    /// The same `header`/`body` values may be reused across independent
    /// transactions; within one transaction a body is attached at most once.
    ///
    /// # Errors
    /// On failure the whole transaction is failed for all recipients and the
    /// caller should abort.
    async fn body(&mut self, header: &Header, body: &Body) -> Result<()>;

    /// Finalize the transaction. Only valid after a successful body phase.
    ///
    /// Does not return before the backend's durability guarantee holds.
    ///
    /// # Errors
    /// If the backend cannot durably finalize (disk full, downstream
    /// rejection at commit time). The caller must treat the transaction as
    /// failed even though earlier phases succeeded; resources are still
    /// released.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Release all resources associated with the transaction.
    ///
    /// Safe to call from any non-terminal state, including after partial
    /// recipient addition or a failed body call. Never errors.
    async fn abort(self: Box<Self>);

    /// Probe for the optional non-atomic submission capability.
    ///
    /// Returns `None` unless the backend can isolate per-recipient failures.
    fn partial(&mut self) -> Option<&mut dyn PartialDelivery> {
        None
    }
}

/// Optional capability: non-atomic body submission with independent
/// success/failure per recipient.
///
/// Exists for backends that fan out to heterogeneous destinations, where one
/// bad recipient must not block delivery to the rest.
#[async_trait]
pub trait PartialDelivery: Delivery {
    /// Attempt delivery to each added recipient independently.
    ///
    /// For every recipient added to the transaction, exactly one outcome is
    /// reported to `status` via
    /// [`StatusCollector::set_status`]. Invoking this after a prior
    /// successful atomic body on the same transaction is illegal and is
    /// reported as an invalid-state outcome for every recipient.
    async fn body_non_atomic(
        &mut self,
        status: &mut dyn StatusCollector,
        header: &Header,
        body: &Body,
    );
}

/// Non-terminal progress of a transaction.
///
/// `Started → Accumulating → BodySubmitted`, with abort reachable from every
/// state. The terminal outcomes are not represented here: they consume the
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// Transaction started; no recipients yet.
    #[default]
    Started,
    /// At least one recipient accepted.
    Accumulating,
    /// A body phase completed; only commit or abort remain.
    BodySubmitted,
}

impl TransactionState {
    /// Whether a recipient may still be added.
    #[must_use]
    pub const fn can_add_rcpt(self) -> bool {
        matches!(self, Self::Started | Self::Accumulating)
    }

    /// Whether a body phase may run. Requires at least one accepted
    /// recipient, and a body may be attached at most once.
    #[must_use]
    pub const fn can_submit_body(self) -> bool {
        matches!(self, Self::Accumulating)
    }

    /// Whether the transaction may be committed.
    #[must_use]
    pub const fn can_commit(self) -> bool {
        matches!(self, Self::BodySubmitted)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Started => "started",
            Self::Accumulating => "accumulating recipients",
            Self::BodySubmitted => "body submitted",
        })
    }
}
