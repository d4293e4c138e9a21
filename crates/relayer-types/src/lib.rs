//! Common types shared across the relayer workspace.
//!
//! This crate defines the core data model — orders, transaction logs, and
//! the peer-bus gossip envelope — plus the ambient plumbing (config schema
//! validation, redacted secrets, storage key naming) that every other
//! relayer crate builds on.

/// Order record and its `MatchedStatus` state machine.
pub mod order;
/// On-chain settlement attempt record and its `TransactionStatus` state machine.
pub mod transaction;
/// Chain/guardian/digest primitives shared by the peer bus and workers.
pub mod chain;
/// Peer bus gossip envelope.
pub mod peer;
/// Redacted secret value wrapper used for private keys and credentials.
pub mod secret_string;
/// Storage key naming for the two persisted tables.
pub mod storage;
/// Miscellaneous helpers (timestamps, id formatting).
pub mod utils;
/// Configuration schema validation types shared by every pluggable component.
pub mod validation;
/// Plugin registry trait used by factory-based component implementations.
pub mod registry;

pub use chain::{Address, ChainName, Digest, SignatureBytes};
pub use order::{MatchedStatus, Order};
pub use peer::{GossipMessage, GuardianSignature};
pub use secret_string::SecretString;
pub use storage::StorageKey;
pub use transaction::{TransactionLog, TransactionStatus};
pub use utils::{current_timestamp, truncate_id};
pub use validation::{ConfigSchema, Field, FieldType, Schema, ValidationError};
