//! # reward-engine
//!
//! Epoch rewarding reconciliation.
//!
//! Once per epoch the eligible mixnodes and gateways are validated, split
//! into bounded batches, and each batch is submitted as one reward
//! transaction. Every batch ends `Confirmed`, `Failed` or `TimedOut`; the
//! last two leave their members possibly unrewarded, and the whole epoch is
//! folded into a single report written atomically to the database.
//!
//! Nothing is retried within an epoch: a timed out transaction may still be
//! included, so resubmitting could pay twice. Reconciliation of the
//! possibly-unrewarded participants happens later, against on-chain state.
//!
//! ## Modules
//!
//! - [`chunker`]: eligibility validation and deterministic batching
//! - [`client`]: chain client seam, reward messages and fee estimation
//! - [`config`]: chain and batching configuration sections
//! - [`dispatcher`]: bounded-concurrency batch submission and classification
//! - [`recorder`]: folding batch outcomes into a persisted report
//! - [`scheduler`]: per-epoch driver and epoch timing
//! - [`stub`]: scripted in-memory chain client

pub mod chunker;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod recorder;
pub mod scheduler;
pub mod stub;

use reward_types::ParticipantKind;

/// Error types for epoch rewarding.
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    /// A participant record failed validation.
    #[error("invalid {kind} record {identity:?}: {reason}")]
    InvalidParticipant {
        kind: ParticipantKind,
        identity: String,
        reason: String,
    },

    /// The same identity appears twice within one kind.
    #[error("duplicate {kind} identity {identity}")]
    DuplicateParticipant {
        kind: ParticipantKind,
        identity: String,
    },

    /// Batches must hold at least one participant.
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The eligibility source could not produce this epoch's participants.
    #[error("eligibility source failed: {0}")]
    Eligibility(String),

    /// Persisting the report failed; the epoch produced no report.
    #[error("storage failure: {0}")]
    Storage(#[from] reward_db::DbError),
}

/// Convenience result type for epoch rewarding.
pub type Result<T> = std::result::Result<T, RewardError>;
