//! Reward participants: mixnodes and gateways.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{IdentityKey, Result, TypesError};

/// Percentage of successful measurements, in range 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Uptime(u8);

impl Uptime {
    pub const fn zero() -> Self {
        Uptime(0)
    }

    /// Uptime expressed as `numerator / denominator`.
    ///
    /// A zero denominator (no measurements at all) yields zero uptime.
    pub fn from_ratio(numerator: usize, denominator: usize) -> Result<Self> {
        if denominator == 0 {
            return Ok(Self::zero());
        }

        let uptime = ((numerator as f32 / denominator as f32) * 100.0) as i64;
        Self::try_from(uptime)
    }

    pub fn u8(&self) -> u8 {
        self.0
    }
}

impl From<Uptime> for u8 {
    fn from(uptime: Uptime) -> Self {
        uptime.0
    }
}

impl TryFrom<u8> for Uptime {
    type Error = TypesError;

    fn try_from(value: u8) -> Result<Self> {
        if value > 100 {
            Err(TypesError::InvalidUptime(value.into()))
        } else {
            Ok(Uptime(value))
        }
    }
}

impl TryFrom<i64> for Uptime {
    type Error = TypesError;

    fn try_from(value: i64) -> Result<Self> {
        if !(0..=100).contains(&value) {
            Err(TypesError::InvalidUptime(value))
        } else {
            Ok(Uptime(value as u8))
        }
    }
}

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// The two kinds of network participant that are rewarded independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    Mixnode,
    Gateway,
}

impl ParticipantKind {
    pub const ALL: [ParticipantKind; 2] = [ParticipantKind::Mixnode, ParticipantKind::Gateway];

    /// Label used in logs, memos and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantKind::Mixnode => "mixnode",
            ParticipantKind::Gateway => "gateway",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ParticipantKind::Mixnode => "mixnodes",
            ParticipantKind::Gateway => "gateways",
        }
    }
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mixnode" => Ok(ParticipantKind::Mixnode),
            "gateway" => Ok(ParticipantKind::Gateway),
            other => Err(TypesError::UnknownKind(other.to_string())),
        }
    }
}

/// A participant eligible for a reward this epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// Identity key of the node.
    pub identity: IdentityKey,
    /// Last known uptime measurement.
    pub uptime: Uptime,
    /// Number of delegations towards the node; drives gas estimation.
    #[serde(default)]
    pub total_delegations: u64,
}

impl ParticipantRecord {
    pub fn new(identity: impl Into<IdentityKey>, uptime: Uptime) -> Self {
        Self {
            identity: identity.into(),
            uptime,
            total_delegations: 0,
        }
    }

    pub fn with_delegations(mut self, total_delegations: u64) -> Self {
        self.total_delegations = total_delegations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_bounds() {
        assert!(Uptime::try_from(100u8).is_ok());
        assert!(Uptime::try_from(101u8).is_err());
        assert!(Uptime::try_from(-1i64).is_err());
        assert_eq!(Uptime::try_from(42i64).expect("uptime").u8(), 42);
    }

    #[test]
    fn test_uptime_from_ratio() {
        assert_eq!(Uptime::from_ratio(0, 0).expect("ratio"), Uptime::zero());
        assert_eq!(Uptime::from_ratio(1, 2).expect("ratio").u8(), 50);
        assert_eq!(Uptime::from_ratio(24, 24).expect("ratio").u8(), 100);
        assert!(Uptime::from_ratio(3, 2).is_err());
    }

    #[test]
    fn test_uptime_serde_rejects_out_of_range() {
        let parsed: Uptime = serde_json::from_str("87").expect("parse");
        assert_eq!(parsed.u8(), 87);
        assert!(serde_json::from_str::<Uptime>("150").is_err());
    }

    #[test]
    fn test_kind_labels() {
        for kind in ParticipantKind::ALL {
            let parsed: ParticipantKind = kind.as_str().parse().expect("parse");
            assert_eq!(parsed, kind);
        }
        assert!("validator".parse::<ParticipantKind>().is_err());
        assert_eq!(ParticipantKind::Gateway.plural(), "gateways");
    }
}
