//! Mail delivery transaction abstraction and benchmarking harness.
//!
//! A [`DeliveryTarget`] hands out [`Delivery`] transactions: one sender, an
//! accumulating recipient set, a body submitted atomically or per recipient,
//! and exactly one terminal outcome (commit or abort). [`BenchDriver`] measures
//! the cost of each protocol phase against any backend.

pub mod backends;
pub mod bench;
pub mod body;
pub mod error;
pub mod fabricator;
pub mod header;
pub mod message;
pub mod status;
pub mod target;

pub use backends::{MemoryTarget, MemoryTargetConfig, StoredMessage};
pub use bench::{BenchConfig, BenchDriver, Phase, PhaseReport};
pub use body::Body;
pub use error::{DeliveryError, Result};
pub use fabricator::{Fabricator, FabricatorConfig, HeaderPreamble};
pub use header::Header;
pub use message::{MessageId, MsgMetadata};
pub use status::{MultiStatus, StatusCollector};
pub use target::{Delivery, DeliveryTarget, PartialDelivery, TransactionState};
