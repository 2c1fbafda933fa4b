//! # reward-types
//!
//! Shared domain types used across the rewarding workspace: participant
//! records, batch outcomes, persisted report records and the mixnet
//! contract messages submitted through the chain client.

pub mod contract;
pub mod outcome;
pub mod participant;
pub mod report;

pub use outcome::BatchOutcome;
pub use participant::{ParticipantKind, ParticipantRecord, Uptime};

/// Cryptographic identity of a mixnode or gateway (base58 encoded key).
pub type IdentityKey = String;

/// Maximum accepted length of an identity key, in bytes.
pub const MAX_IDENTITY_LEN: usize = 128;

/// Errors raised while constructing domain values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Uptime outside of the 0-100 range.
    #[error("invalid uptime: {0} is not within 0..=100")]
    InvalidUptime(i64),

    /// Unknown participant kind label.
    #[error("unknown participant kind: {0}")]
    UnknownKind(String),
}

/// Convenience result type for domain value construction.
pub type Result<T> = std::result::Result<T, TypesError>;
