//! In-memory mailbox store backend.
//!
//! Stores committed messages in per-recipient mailboxes behind an `RwLock`.
//! Primarily intended for testing and benchmarking: it exposes resource
//! counters so tests can verify that every started transaction is released,
//! and failure injection so tests can drive the error paths. Body submission
//! is idempotent: shared header/body buffers are never mutated.

use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Notify;

use crate::{
    body::Body,
    error::{DeliveryError, Result},
    header::Header,
    message::MsgMetadata,
    status::StatusCollector,
    target::{Delivery, DeliveryTarget, PartialDelivery, TransactionState},
};

/// A message as committed into a recipient's mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Envelope metadata the transaction was started with.
    pub metadata: MsgMetadata,
    /// Sender address.
    pub sender: String,
    /// Message header.
    pub header: Header,
    /// Message body.
    pub body: Body,
}

/// Configuration for the in-memory backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryTargetConfig {
    /// Maximum number of concurrently open transactions (omit for unlimited).
    #[serde(default)]
    pub max_active: Option<usize>,
}

impl MemoryTargetConfig {
    /// Build the backend this configuration describes.
    #[must_use]
    pub fn into_target(self) -> MemoryTarget {
        self.max_active
            .map_or_else(MemoryTarget::new, MemoryTarget::with_capacity)
    }
}

#[derive(Debug, Default)]
struct Shared {
    mailboxes: RwLock<AHashMap<String, Vec<StoredMessage>>>,
    rejected: RwLock<AHashSet<String>>,
    active: AtomicUsize,
    fail_commit: AtomicBool,
    notify: Notify,
}

/// In-memory mailbox store implementing the delivery transaction protocol,
/// including the optional non-atomic submission capability.
///
/// Clones share the same store, so a target can be handed to many concurrent
/// callers. Each open transaction counts against `active_transactions` until
/// its terminal call (or, as a backstop, until it is dropped).
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    shared: Arc<Shared>,
    max_active: Option<usize>,
}

impl MemoryTarget {
    /// Create a store with no limit on concurrently open transactions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that refuses to start more than `max_active`
    /// concurrent transactions.
    #[must_use]
    pub fn with_capacity(max_active: usize) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            max_active: Some(max_active),
        }
    }

    /// Deny `recipient` from now on: `add_rcpt` rejects it, and non-atomic
    /// submission reports a per-recipient failure for it.
    pub fn reject_recipient(&self, recipient: &str) {
        self.shared
            .rejected
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(recipient.to_string());
    }

    /// Make the next commits fail (or stop failing) without affecting
    /// earlier phases.
    pub fn induce_commit_failure(&self, fail: bool) {
        self.shared.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Number of transactions started but not yet terminated.
    #[must_use]
    pub fn active_transactions(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Total messages committed across all mailboxes.
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.shared
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// The messages committed for `recipient`, in commit order.
    #[must_use]
    pub fn mailbox(&self, recipient: &str) -> Vec<StoredMessage> {
        self.shared
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(recipient)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop all committed messages.
    pub fn clear(&self) {
        self.shared
            .mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Wait until at least `expected` messages have been committed.
    ///
    /// # Errors
    /// If the timeout elapses first.
    pub async fn wait_for_delivered(
        &self,
        expected: usize,
        timeout: std::time::Duration,
    ) -> Result<()> {
        tokio::time::timeout(timeout, async {
            loop {
                if self.delivered_count() >= expected {
                    return;
                }
                self.shared.notify.notified().await;
            }
        })
        .await
        .map_err(|e| DeliveryError::Internal(format!("Timeout waiting for deliveries: {e}")))
    }

    fn is_rejected(&self, recipient: &str) -> bool {
        self.shared
            .rejected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(recipient)
    }

    fn store(&self, recipient: &str, message: StoredMessage) {
        self.shared
            .mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(recipient.to_string())
            .or_default()
            .push(message);
    }
}

/// Minimal syntax check: one `@` with non-empty local part and domain, no
/// whitespace. Address parsing proper is out of scope here.
fn validate_address(address: &str) -> Result<()> {
    let well_formed = address.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.is_empty()
            && !domain.contains('@')
            && !address.chars().any(char::is_whitespace)
    });

    if well_formed {
        Ok(())
    } else {
        Err(DeliveryError::RecipientRejected(format!(
            "malformed address: {address}"
        )))
    }
}

#[async_trait]
impl DeliveryTarget for MemoryTarget {
    async fn start(&self, metadata: &MsgMetadata, sender: &str) -> Result<Box<dyn Delivery>> {
        validate_address(sender)
            .map_err(|_| DeliveryError::Start(format!("invalid sender: {sender}")))?;

        if let Some(max) = self.max_active {
            // Reserve the slot in the same atomic step as the bound check,
            // so concurrent starts cannot both observe a free slot.
            self.shared
                .active
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                    (active < max).then_some(active + 1)
                })
                .map_err(|_| {
                    DeliveryError::Start(format!("transaction limit reached: {max} already open"))
                })?;
        } else {
            self.shared.active.fetch_add(1, Ordering::SeqCst);
        }
        tracing::trace!(message_id = %metadata.id, sender, "transaction started");

        Ok(Box::new(MemoryDelivery {
            target: self.clone(),
            metadata: metadata.clone(),
            sender: sender.to_string(),
            recipients: Vec::new(),
            state: TransactionState::Started,
            staged: None,
            finished: false,
        }))
    }
}

/// One open transaction against a [`MemoryTarget`].
#[derive(Debug)]
pub struct MemoryDelivery {
    target: MemoryTarget,
    metadata: MsgMetadata,
    sender: String,
    recipients: Vec<String>,
    state: TransactionState,
    /// Header, body, and the recipients that will receive them on commit.
    staged: Option<(Header, Body, Vec<String>)>,
    finished: bool,
}

impl MemoryDelivery {
    fn release(&mut self) {
        if !self.finished {
            self.finished = true;
            self.target.shared.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryDelivery {
    fn drop(&mut self) {
        if !self.finished {
            tracing::trace!(
                message_id = %self.metadata.id,
                "transaction dropped without terminal call, releasing reservation"
            );
            self.release();
        }
    }
}

#[async_trait]
impl Delivery for MemoryDelivery {
    async fn add_rcpt(&mut self, recipient: &str) -> Result<()> {
        if !self.state.can_add_rcpt() {
            return Err(DeliveryError::InvalidState(format!(
                "cannot add recipient while {}",
                self.state
            )));
        }

        validate_address(recipient)?;
        if self.target.is_rejected(recipient) {
            return Err(DeliveryError::RecipientRejected(format!(
                "recipient denied by policy: {recipient}"
            )));
        }

        self.recipients.push(recipient.to_string());
        self.state = TransactionState::Accumulating;
        Ok(())
    }

    async fn body(&mut self, header: &Header, body: &Body) -> Result<()> {
        if !self.state.can_submit_body() {
            return Err(DeliveryError::InvalidState(format!(
                "cannot submit body while {}",
                self.state
            )));
        }

        // All-or-nothing: a recipient denied after RCPT time fails everyone.
        if let Some(rcpt) = self
            .recipients
            .iter()
            .find(|r| self.target.is_rejected(r.as_str()))
        {
            return Err(DeliveryError::Body(format!(
                "delivery refused for {rcpt}, transaction failed for all recipients"
            )));
        }

        self.staged = Some((header.clone(), body.clone(), self.recipients.clone()));
        self.state = TransactionState::BodySubmitted;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        if !self.state.can_commit() {
            self.release();
            return Err(DeliveryError::InvalidState(format!(
                "cannot commit while {}",
                self.state
            )));
        }

        if self.target.shared.fail_commit.load(Ordering::SeqCst) {
            self.release();
            return Err(DeliveryError::Commit(
                "storage refused to finalize".to_string(),
            ));
        }

        if let Some((header, body, recipients)) = self.staged.take() {
            for rcpt in &recipients {
                self.target.store(
                    rcpt,
                    StoredMessage {
                        metadata: self.metadata.clone(),
                        sender: self.sender.clone(),
                        header: header.clone(),
                        body: body.clone(),
                    },
                );
            }
            tracing::debug!(
                message_id = %self.metadata.id,
                recipients = recipients.len(),
                "transaction committed"
            );
        }

        self.release();
        self.target.shared.notify.notify_waiters();
        Ok(())
    }

    async fn abort(mut self: Box<Self>) {
        tracing::trace!(message_id = %self.metadata.id, "transaction aborted");
        self.staged = None;
        self.release();
    }

    fn partial(&mut self) -> Option<&mut dyn PartialDelivery> {
        Some(self)
    }
}

#[async_trait]
impl PartialDelivery for MemoryDelivery {
    async fn body_non_atomic(
        &mut self,
        status: &mut dyn StatusCollector,
        header: &Header,
        body: &Body,
    ) {
        if !self.state.can_submit_body() {
            // Out-of-sequence call: still one outcome per recipient.
            for rcpt in &self.recipients {
                status.set_status(
                    rcpt,
                    Err(DeliveryError::InvalidState(format!(
                        "cannot submit body while {}",
                        self.state
                    ))),
                );
            }
            return;
        }

        let mut delivered = Vec::with_capacity(self.recipients.len());
        for rcpt in &self.recipients {
            if self.target.is_rejected(rcpt) {
                status.set_status(
                    rcpt,
                    Err(DeliveryError::RecipientRejected(format!(
                        "recipient denied by policy: {rcpt}"
                    ))),
                );
            } else {
                delivered.push(rcpt.clone());
                status.set_status(rcpt, Ok(()));
            }
        }

        self.staged = Some((header.clone(), body.clone(), delivered));
        self.state = TransactionState::BodySubmitted;
    }
}
