//! AssignmentCoordinator - 課題レコードと添付ファイルの一貫性を保つ
//!
//! ファイルキーは course を partition にして導出し、insert 前のドラフトに載せる。
//! 空ファイルは「ファイルなし」と同じ扱い。

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;

use super::lifecycle::RecordLifecycle;
use crate::domain::{
    Assignment, AssignmentDraft, AssignmentId, BlobKey, BlobTags, CoordinatorError, Enriched,
    FileUpload, NewAssignment, Partition,
};
use crate::ports::Clock;

pub struct AssignmentCoordinator {
    lifecycle: RecordLifecycle<Assignment>,
    clock: Arc<dyn Clock>,
}

impl AssignmentCoordinator {
    pub(crate) fn new(
        lifecycle: RecordLifecycle<Assignment>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { lifecycle, clock }
    }

    pub fn container(&self) -> &str {
        &self.lifecycle.container
    }

    /// Persist a new assignment and upload its file, if any.
    ///
    /// # Errors
    /// - `Store`: the insert failed; nothing was uploaded.
    /// - `PartialWrite`: the record exists (marked `Failed`) but the upload did not happen.
    pub async fn create_assignment(
        &self,
        input: NewAssignment,
        file: Option<FileUpload>,
    ) -> Result<Assignment, CoordinatorError> {
        let draft = AssignmentDraft::new(input, self.clock.now());
        let (draft, content) = match file.filter(|f| !f.is_empty()) {
            Some(file) => {
                let key = BlobKey::derive(&Partition::course(&draft.course_id), &file.file_name);
                (draft.with_pending_file(key), Some(file.content))
            }
            None => (draft, None),
        };

        let assignment = self
            .lifecycle
            .create(draft, content, |a: &Assignment| {
                BlobTags::new()
                    .with(BlobTags::USER_ID, a.issuer_id.as_str())
                    .with(BlobTags::COURSE_ID, a.course_id.as_str())
                    .with(BlobTags::ASSIGNMENT_ID, a.id.to_string())
            })
            .await?;

        info!(
            assignment_id = %assignment.id,
            course_id = %assignment.course_id,
            has_file = assignment.file_key.is_some(),
            "assignment created"
        );
        Ok(assignment)
    }

    /// Assignments of `course_id`, each with a URL valid for the default TTL.
    pub async fn list_assignments_by_course(
        &self,
        course_id: &str,
    ) -> Result<Vec<Enriched<Assignment>>, CoordinatorError> {
        self.list_assignments_by_course_with_ttl(course_id, self.lifecycle.urls.default_ttl)
            .await
    }

    pub async fn list_assignments_by_course_with_ttl(
        &self,
        course_id: &str,
        ttl: Duration,
    ) -> Result<Vec<Enriched<Assignment>>, CoordinatorError> {
        self.lifecycle.urls.check(ttl)?;
        let found = self
            .lifecycle
            .find(&|a: &Assignment| a.course_id == course_id)
            .await?;
        self.lifecycle.enrich(found, ttl).await
    }

    pub async fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<Enriched<Assignment>>, CoordinatorError> {
        let Some(assignment) = self.lifecycle.get(id).await? else {
            return Ok(None);
        };
        let mut enriched = self
            .lifecycle
            .enrich(vec![assignment], self.lifecycle.urls.default_ttl)
            .await?;
        Ok(enriched.pop())
    }

    /// Bytes of the attached file. `None` if there is no record, no file, or the object is gone.
    pub async fn download_file(&self, id: AssignmentId) -> Result<Option<Bytes>, CoordinatorError> {
        self.lifecycle.download(id).await
    }

    /// `Err(NotFound)` for an unknown id. A failing file delete is logged, not returned.
    pub async fn delete_assignment(&self, id: AssignmentId) -> Result<(), CoordinatorError> {
        self.lifecycle.delete(id).await
    }
}
