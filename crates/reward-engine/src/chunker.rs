//! Eligibility validation and batching.
//!
//! Participants are sorted by identity before being cut into batches, so the
//! same eligible set always produces the same batch membership. A batch maps
//! to one transaction; `max_batch_size` keeps that transaction within the
//! chain's gas limits.

use std::collections::HashSet;

use reward_types::{ParticipantKind, ParticipantRecord, MAX_IDENTITY_LEN};

use crate::{Result, RewardError};

/// A group of participants rewarded through a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of the batch within its kind.
    pub index: usize,
    pub members: Vec<ParticipantRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn total_delegations(&self) -> u64 {
        self.members
            .iter()
            .map(|member| member.total_delegations)
            .fold(0u64, u64::saturating_add)
    }
}

/// Reject malformed or duplicated records before anything is submitted.
pub fn validate(kind: ParticipantKind, participants: &[ParticipantRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(participants.len());

    for participant in participants {
        let identity = participant.identity.as_str();
        let reason = if identity.is_empty() {
            Some("empty identity")
        } else if identity.len() > MAX_IDENTITY_LEN {
            Some("identity too long")
        } else if identity.chars().any(char::is_whitespace) {
            Some("identity contains whitespace")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(RewardError::InvalidParticipant {
                kind,
                identity: identity.to_string(),
                reason: reason.to_string(),
            });
        }

        if !seen.insert(identity) {
            return Err(RewardError::DuplicateParticipant {
                kind,
                identity: identity.to_string(),
            });
        }
    }

    Ok(())
}

/// Split participants into batches of at most `max_batch_size` members.
///
/// Every batch but the last is full. No participants means no batches.
pub fn chunk(mut participants: Vec<ParticipantRecord>, max_batch_size: usize) -> Result<Vec<Batch>> {
    if max_batch_size == 0 {
        return Err(RewardError::InvalidBatchSize);
    }

    participants.sort_by(|a, b| a.identity.cmp(&b.identity));

    Ok(participants
        .chunks(max_batch_size)
        .enumerate()
        .map(|(index, members)| Batch {
            index,
            members: members.to_vec(),
        })
        .collect())
}
