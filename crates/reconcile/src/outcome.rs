//! Commit status and outcome.

use serde::{Deserialize, Serialize};

use common::BatchId;

use crate::error::ReconcileError;
use crate::record::CommitRecord;
use crate::scan::ProductRef;

/// How a commit attempt ended.
///
/// ```text
/// validate ──┬──► Rejected                      (nothing written)
///            └──► apply ──┬──► Committed
///                         ├──► Compensated      (partial apply rolled back)
///                         ├──► CompensationIncomplete
///                         └──► PartiallyApplied (restoration, no rollback)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitStatus {
    /// Every write succeeded.
    Committed,

    /// Pre-flight validation or the batch read failed; no write was issued.
    Rejected,

    /// Some writes failed and every successful write was reverted.
    Compensated,

    /// Some writes failed and at least one compensating write failed too.
    CompensationIncomplete,

    /// Some additive restoration writes failed; the rest stay applied.
    PartiallyApplied,
}

impl CommitStatus {
    /// Returns true only for a fully applied batch.
    pub fn is_success(&self) -> bool {
        matches!(self, CommitStatus::Committed)
    }

    /// Returns true if the store may hold changes from this attempt.
    pub fn left_changes(&self) -> bool {
        matches!(
            self,
            CommitStatus::Committed
                | CommitStatus::CompensationIncomplete
                | CommitStatus::PartiallyApplied
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStatus::Committed => "Committed",
            CommitStatus::Rejected => "Rejected",
            CommitStatus::Compensated => "Compensated",
            CommitStatus::CompensationIncomplete => "CompensationIncomplete",
            CommitStatus::PartiallyApplied => "PartiallyApplied",
        }
    }
}

impl std::fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one deduction or restoration attempt.
#[derive(Debug)]
pub struct CommitOutcome {
    pub batch_id: BatchId,
    pub status: CommitStatus,
    pub errors: Vec<ReconcileError>,
    /// Items skipped because their product could not be found.
    pub skipped: Vec<ProductRef>,
    /// Changes still in effect after the attempt.
    pub record: CommitRecord,
}

impl CommitOutcome {
    pub fn success(&self) -> bool {
        self.status.is_success()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Shortfalls reported by pre-flight validation, if any.
    pub fn shortfalls(&self) -> &[crate::error::Shortfall] {
        self.errors
            .iter()
            .map(ReconcileError::shortfalls)
            .find(|s| !s.is_empty())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_committed_is_success() {
        assert!(CommitStatus::Committed.is_success());
        assert!(!CommitStatus::Rejected.is_success());
        assert!(!CommitStatus::Compensated.is_success());
        assert!(!CommitStatus::CompensationIncomplete.is_success());
        assert!(!CommitStatus::PartiallyApplied.is_success());
    }

    #[test]
    fn test_left_changes() {
        assert!(CommitStatus::Committed.left_changes());
        assert!(!CommitStatus::Rejected.left_changes());
        assert!(!CommitStatus::Compensated.left_changes());
        assert!(CommitStatus::CompensationIncomplete.left_changes());
        assert!(CommitStatus::PartiallyApplied.left_changes());
    }

    #[test]
    fn test_display() {
        assert_eq!(CommitStatus::Compensated.to_string(), "Compensated");
        assert_eq!(
            CommitStatus::CompensationIncomplete.to_string(),
            "CompensationIncomplete"
        );
    }
}
