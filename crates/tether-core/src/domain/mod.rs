//! Domain model (IDs, records, status, file state, keys, errors).

pub mod access;
pub mod assignment;
pub mod blob_key;
pub mod errors;
pub mod file_state;
pub mod ids;
pub mod record;
pub mod status;
pub mod submission;

pub use self::access::{DEFAULT_URL_TTL, Enriched, MAX_URL_TTL, ScopedUrl};
pub use self::assignment::{Assignment, AssignmentDraft, NewAssignment};
pub use self::blob_key::{BlobKey, BlobTags, FileUpload, Partition};
pub use self::errors::{CoordinatorError, ErrorKind};
pub use self::file_state::FileState;
pub use self::ids::{AssignmentId, Id, IdMarker, ParseIdError, SubmissionId};
pub use self::record::Record;
pub use self::status::{IllegalTransition, SubmissionStatus, TransitionPolicy};
pub use self::submission::{NewSubmission, Submission, SubmissionDraft};
