//! Submission review status and its transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Review status of a submission.
///
/// State transitions:
/// - Submitted -> UnderReview
/// - UnderReview -> Accepted
/// - UnderReview -> Rejected
/// - Accepted / Rejected -> UnderReview (only when re-review is enabled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Initial state after upload.
    Submitted,

    /// A reviewer picked the submission up.
    UnderReview,

    Accepted,

    Rejected,
}

impl SubmissionStatus {
    /// Is this a terminal state (no forward transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStatus::Accepted | SubmissionStatus::Rejected)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::UnderReview => "UNDER_REVIEW",
            SubmissionStatus::Accepted => "ACCEPTED",
            SubmissionStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: SubmissionStatus,
    pub to: SubmissionStatus,
}

/// TransitionPolicy は状態遷移の可否を判定する
///
/// 副作用なしの純粋関数。実際の更新は SubmissionCoordinator が行う。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionPolicy {
    /// Accepted / Rejected から UnderReview へ戻すことを許可するか
    pub allow_re_review: bool,
}

impl TransitionPolicy {
    pub fn new(allow_re_review: bool) -> Self {
        Self { allow_re_review }
    }

    /// `from -> to` を検証する。同じ状態への遷移は冪等な no-op として許可。
    pub fn check(
        &self,
        from: SubmissionStatus,
        to: SubmissionStatus,
    ) -> Result<(), IllegalTransition> {
        use SubmissionStatus::*;

        let allowed = match (from, to) {
            (a, b) if a == b => true,
            (Submitted, UnderReview) => true,
            (UnderReview, Accepted) | (UnderReview, Rejected) => true,
            (Accepted, UnderReview) | (Rejected, UnderReview) => self.allow_re_review,
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(IllegalTransition { from, to })
        }
    }
}
