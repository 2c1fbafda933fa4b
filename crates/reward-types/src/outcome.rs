//! Classified result of submitting one reward batch.

use serde::{Deserialize, Serialize};

/// Outcome of a single batch transaction.
///
/// `TimedOut` is not a flavour of `Failed`: the transaction may still have
/// been included after the client stopped waiting, so its members are in an
/// unknown state rather than certainly unrewarded. Both variants keep their
/// own message so the stored audit trail can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// The chain acknowledged successful execution before the deadline.
    Confirmed,
    /// The chain explicitly rejected the transaction.
    Failed(String),
    /// No confirmation was observed before the deadline.
    TimedOut(String),
}

impl BatchOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, BatchOutcome::Confirmed)
    }

    /// Message to persist for a non-confirmed batch.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            BatchOutcome::Confirmed => None,
            BatchOutcome::Failed(message) | BatchOutcome::TimedOut(message) => Some(message),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatchOutcome::Confirmed => "confirmed",
            BatchOutcome::Failed(_) => "failed",
            BatchOutcome::TimedOut(_) => "timed_out",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        assert_eq!(BatchOutcome::Confirmed.error_message(), None);
        assert_eq!(
            BatchOutcome::Failed("unauthorized".into()).error_message(),
            Some("unauthorized")
        );
        assert_eq!(
            BatchOutcome::TimedOut("no confirmation".into()).error_message(),
            Some("no confirmation")
        );
    }

    #[test]
    fn test_timeout_is_distinct_from_failure() {
        let failed = BatchOutcome::Failed("x".into());
        let timed_out = BatchOutcome::TimedOut("x".into());
        assert_ne!(failed, timed_out);
        assert_ne!(failed.label(), timed_out.label());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(BatchOutcome::TimedOut("late".into())).expect("json");
        assert_eq!(json, serde_json::json!({"status": "timed_out", "message": "late"}));
        let json = serde_json::to_value(BatchOutcome::Confirmed).expect("json");
        assert_eq!(json, serde_json::json!({"status": "confirmed"}));
    }
}
