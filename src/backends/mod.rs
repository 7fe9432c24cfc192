//! Delivery backend implementations.
//!
//! Only the in-memory mailbox store ships with the crate; production
//! backends (local maildir, remote relay, pipe-to-process) live with their
//! transports and implement the same traits.

pub mod memory;

pub use memory::{MemoryTarget, MemoryTargetConfig, StoredMessage};
