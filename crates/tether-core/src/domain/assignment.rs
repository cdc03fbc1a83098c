//! Assignment: created by an issuing party, optionally carrying a file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blob_key::BlobKey;
use super::file_state::FileState;
use super::ids::{AssignmentId, AssignmentKind, Id};
use super::record::Record;

/// Validated input from the inbound layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub issuer_id: String,
    pub course_id: String,
    pub description: String,
    /// Informational only, never enforced here.
    pub deadline_at: DateTime<Utc>,
}

/// Assignment before the metadata store assigned its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDraft {
    pub issuer_id: String,
    pub course_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,
    pub file_key: Option<BlobKey>,
    pub file_state: FileState,
}

impl AssignmentDraft {
    pub fn new(input: NewAssignment, created_at: DateTime<Utc>) -> Self {
        Self {
            issuer_id: input.issuer_id,
            course_id: input.course_id,
            description: input.description,
            created_at,
            deadline_at: input.deadline_at,
            file_key: None,
            file_state: FileState::None,
        }
    }

    /// Reference the eventual object before the record is persisted.
    pub fn with_pending_file(mut self, key: BlobKey) -> Self {
        self.file_key = Some(key);
        self.file_state = FileState::Pending;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub issuer_id: String,
    pub course_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,

    /// Set once at creation, never replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_key: Option<BlobKey>,

    #[serde(default)]
    pub file_state: FileState,
}

impl Record for Assignment {
    type Marker = AssignmentKind;
    type Draft = AssignmentDraft;

    fn from_draft(id: Id<AssignmentKind>, draft: AssignmentDraft) -> Self {
        Self {
            id,
            issuer_id: draft.issuer_id,
            course_id: draft.course_id,
            description: draft.description,
            created_at: draft.created_at,
            deadline_at: draft.deadline_at,
            file_key: draft.file_key,
            file_state: draft.file_state,
        }
    }

    fn id(&self) -> AssignmentId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
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
