//! Submission: created by a responding party against an assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blob_key::BlobKey;
use super::file_state::FileState;
use super::ids::{AssignmentId, Id, SubmissionId, SubmissionKind};
use super::record::Record;
use super::status::SubmissionStatus;

/// Validated input from the inbound layer.
///
/// `assignment_id` is not checked for existence here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub responder_id: String,
    pub assignment_id: AssignmentId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionDraft {
    pub responder_id: String,
    pub assignment_id: AssignmentId,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub file_key: Option<BlobKey>,
    pub file_state: FileState,
}

impl SubmissionDraft {
    pub fn new(input: NewSubmission, submitted_at: DateTime<Utc>) -> Self {
        Self {
            responder_id: input.responder_id,
            assignment_id: input.assignment_id,
            status: SubmissionStatus::Submitted,
            submitted_at,
            file_key: None,
            file_state: FileState::None,
        }
    }

    pub fn with_pending_file(mut self, key: BlobKey) -> Self {
        self.file_key = Some(key);
        self.file_state = FileState::Pending;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub responder_id: String,
    pub assignment_id: AssignmentId,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_key: Option<BlobKey>,

    #[serde(default)]
    pub file_state: FileState,
}

impl Record for Submission {
    type Marker = SubmissionKind;
    type Draft = SubmissionDraft;

    fn from_draft(id: Id<SubmissionKind>, draft: SubmissionDraft) -> Self {
        Self {
            id,
            responder_id: draft.responder_id,
            assignment_id: draft.assignment_id,
            status: draft.status,
            submitted_at: draft.submitted_at,
            file_key: draft.file_key,
            file_state: draft.file_state,
        }
    }

    fn id(&self) -> SubmissionId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    fn file_key(&self) -> Option<&BlobKey> {
        self.file_key.as_ref()
    }

    fn file_state(&self) -> FileState {
        self.file_state
    }

    fn set_file_state(&mut self, state: FileState) {
        self.file_state = state;
    }
}
