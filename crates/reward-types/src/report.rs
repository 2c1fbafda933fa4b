//! Epoch rewarding report records.
//!
//! A report is written once at the end of an epoch run and never mutated.
//! The `New*` types are the write side, assembled before persistence; the
//! plain types are what the store reads back.

use serde::{Deserialize, Serialize};

use crate::{IdentityKey, ParticipantKind, Uptime};

/// A persisted epoch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardingReport {
    pub id: i64,
    /// Unix timestamp (seconds) of report creation.
    pub timestamp: u64,
    pub eligible_mixnodes: u64,
    pub eligible_gateways: u64,
    pub possibly_unrewarded_mixnodes: u64,
    pub possibly_unrewarded_gateways: u64,
}

impl RewardingReport {
    pub fn eligible(&self, kind: ParticipantKind) -> u64 {
        match kind {
            ParticipantKind::Mixnode => self.eligible_mixnodes,
            ParticipantKind::Gateway => self.eligible_gateways,
        }
    }

    pub fn possibly_unrewarded(&self, kind: ParticipantKind) -> u64 {
        match kind {
            ParticipantKind::Mixnode => self.possibly_unrewarded_mixnodes,
            ParticipantKind::Gateway => self.possibly_unrewarded_gateways,
        }
    }
}

/// A batch whose submission did not end in a confirmed success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRewardChunk {
    pub id: i64,
    pub kind: ParticipantKind,
    pub error_message: String,
    pub report_id: i64,
    /// Number of possibly-unrewarded rows referencing this chunk.
    pub members: u64,
}

/// A participant whose reward outcome is not confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossiblyUnrewarded {
    pub identity: IdentityKey,
    pub uptime: Uptime,
}

/// Number of batches dispatched for one participant kind.
///
/// `total_batches == 0` means the kind had nobody to reward this epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTally {
    pub total_batches: u64,
    pub confirmed_batches: u64,
}

/// Failed chunk to be written along with its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFailedChunk {
    pub error_message: String,
    pub members: Vec<PossiblyUnrewarded>,
}

/// Everything recorded for one participant kind in an epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewKindSummary {
    pub eligible: u64,
    pub possibly_unrewarded: u64,
    pub tally: BatchTally,
    pub failed_chunks: Vec<NewFailedChunk>,
}

impl NewKindSummary {
    /// Number of member rows across all failed chunks.
    pub fn member_rows(&self) -> u64 {
        self.failed_chunks
            .iter()
            .map(|chunk| chunk.members.len() as u64)
            .sum()
    }
}

/// A complete report, not yet persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewReport {
    pub timestamp: u64,
    pub mixnodes: NewKindSummary,
    pub gateways: NewKindSummary,
}

impl NewReport {
    pub fn summary(&self, kind: ParticipantKind) -> &NewKindSummary {
        match kind {
            ParticipantKind::Mixnode => &self.mixnodes,
            ParticipantKind::Gateway => &self.gateways,
        }
    }

    pub fn summary_mut(&mut self, kind: ParticipantKind) -> &mut NewKindSummary {
        match kind {
            ParticipantKind::Mixnode => &mut self.mixnodes,
            ParticipantKind::Gateway => &mut self.gateways,
        }
    }
}
