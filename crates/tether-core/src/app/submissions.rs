//! SubmissionCoordinator - 提出物のライフサイクルとレビュー状態
//!
//! ファイルキーの partition は `<assignment>/<responder>`。
//! 状態遷移は TransitionPolicy が判定し、表にない遷移は IllegalTransition。

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use super::lifecycle::RecordLifecycle;
use crate::domain::{
    AssignmentId, BlobKey, BlobTags, CoordinatorError, Enriched, FileUpload, NewSubmission,
    Partition, Submission, SubmissionDraft, SubmissionId, SubmissionStatus, TransitionPolicy,
};
use crate::ports::{Clock, StoreError};

pub struct SubmissionCoordinator {
    lifecycle: RecordLifecycle<Submission>,
    clock: Arc<dyn Clock>,
    policy: TransitionPolicy,
}

impl SubmissionCoordinator {
    pub(crate) fn new(
        lifecycle: RecordLifecycle<Submission>,
        clock: Arc<dyn Clock>,
        policy: TransitionPolicy,
    ) -> Self {
        Self {
            lifecycle,
            clock,
            policy,
        }
    }

    pub fn container(&self) -> &str {
        &self.lifecycle.container
    }

    /// Persist a submission (status `Submitted`) and upload its file.
    ///
    /// A missing or empty file yields a record without a file key.
    /// The assignment id is not checked for existence.
    pub async fn upload_submission(
        &self,
        input: NewSubmission,
        file: Option<FileUpload>,
    ) -> Result<Submission, CoordinatorError> {
        let draft = SubmissionDraft::new(input, self.clock.now());
        let (draft, content) = match file.filter(|f| !f.is_empty()) {
            Some(file) => {
                let partition = Partition::submission(
                    &draft.assignment_id.to_string(),
                    &draft.responder_id,
                );
                let key = BlobKey::derive(&partition, &file.file_name);
                (draft.with_pending_file(key), Some(file.content))
            }
            None => (draft, None),
        };

        let submission = self
            .lifecycle
            .create(draft, content, |s: &Submission| {
                BlobTags::new()
                    .with(BlobTags::USER_ID, s.responder_id.as_str())
                    .with(BlobTags::ASSIGNMENT_ID, s.assignment_id.to_string())
                    .with(BlobTags::SUBMISSION_ID, s.id.to_string())
            })
            .await?;

        info!(
            submission_id = %submission.id,
            assignment_id = %submission.assignment_id,
            has_file = submission.file_key.is_some(),
            "submission uploaded"
        );
        Ok(submission)
    }

    /// Submissions for `assignment_id`, optionally only those of `responder_id`.
    pub async fn list_submissions_for_assignment(
        &self,
        assignment_id: AssignmentId,
        responder_id: Option<&str>,
    ) -> Result<Vec<Enriched<Submission>>, CoordinatorError> {
        self.list_submissions_for_assignment_with_ttl(
            assignment_id,
            responder_id,
            self.lifecycle.urls.default_ttl,
        )
        .await
    }

    pub async fn list_submissions_for_assignment_with_ttl(
        &self,
        assignment_id: AssignmentId,
        responder_id: Option<&str>,
        ttl: Duration,
    ) -> Result<Vec<Enriched<Submission>>, CoordinatorError> {
        self.lifecycle.urls.check(ttl)?;
        let found = self
            .lifecycle
            .find(&|s: &Submission| {
                s.assignment_id == assignment_id
                    && responder_id.is_none_or(|r| s.responder_id == r)
            })
            .await?;
        self.lifecycle.enrich(found, ttl).await
    }

    pub async fn get_submission(
        &self,
        id: SubmissionId,
    ) -> Result<Option<Enriched<Submission>>, CoordinatorError> {
        let Some(submission) = self.lifecycle.get(id).await? else {
            return Ok(None);
        };
        let mut enriched = self
            .lifecycle
            .enrich(vec![submission], self.lifecycle.urls.default_ttl)
            .await?;
        Ok(enriched.pop())
    }

    pub async fn download_file(&self, id: SubmissionId) -> Result<Option<Bytes>, CoordinatorError> {
        self.lifecycle.download(id).await
    }

    /// Move a submission to `status`.
    ///
    /// Returns `Ok(None)` when no such submission exists (nothing is written),
    /// and the stored submission otherwise. Setting the current status again
    /// changes nothing.
    ///
    /// # Errors
    /// `IllegalTransition` when the move is not in the transition table.
    pub async fn update_submission_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, CoordinatorError> {
        let Some(mut submission) = self.lifecycle.get(id).await? else {
            debug!(submission_id = %id, %status, "status update for unknown submission ignored");
            return Ok(None);
        };

        let from = submission.status;
        self.policy.check(from, status)?;
        if from == status {
            return Ok(Some(submission));
        }

        submission.status = status;
        match self.lifecycle.store.update(submission.clone()).await {
            Ok(()) => {
                info!(submission_id = %id, %from, to = %status, "submission status changed");
                Ok(Some(submission))
            }
            // 読んだ直後に削除された
            Err(StoreError::NotFound(_)) => {
                debug!(submission_id = %id, "submission deleted during status update");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_submission(&self, id: SubmissionId) -> Result<(), CoordinatorError> {
        self.lifecycle.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use rstest::rstest;
    use ulid::Ulid;

    use super::*;
    use crate::domain::{ErrorKind, FileState, IllegalTransition};
    use crate::ports::ObjectStoreGateway;
    use crate::testing::{harness, harness_with, test_config};
    use crate::app::TetherConfig;

    fn new_submission(assignment_id: AssignmentId, responder_id: &str) -> NewSubmission {
        NewSubmission {
            responder_id: responder_id.to_string(),
            assignment_id,
        }
    }

    fn source_file() -> FileUpload {
        FileUpload::new("main.rs", "fn main() {}")
    }

    #[tokio::test]
    async fn upload_partitions_by_assignment_and_responder() {
        let h = harness();
        let assignment_id = AssignmentId::from_ulid(Ulid::new());

        let submission = h
            .tether
            .submissions
            .upload_submission(new_submission(assignment_id, "student-1"), Some(source_file()))
            .await
            .unwrap();

        assert_eq!(submission.status, SubmissionStatus::Submitted);
        assert_eq!(submission.file_state, FileState::Attached);
        let key = submission.file_key.clone().unwrap();
        assert!(key.as_str().starts_with(&format!("{assignment_id}/student-1/")));
        assert!(key.as_str().ends_with(".rs"));

        let uploads = h.blobs.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].container, h.config.submission_container);
        assert_eq!(uploads[0].tags.get(BlobTags::USER_ID), Some("student-1"));
        assert_eq!(
            uploads[0].tags.get(BlobTags::SUBMISSION_ID),
            Some(submission.id.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn upload_without_file_yields_record_without_key() {
        let h = harness();
        let submission = h
            .tether
            .submissions
            .upload_submission(new_submission(AssignmentId::from_ulid(Ulid::new()), "s1"), None)
            .await
            .unwrap();
        assert_eq!(submission.file_key, None);
        assert!(h.blobs.uploads().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_is_partial_write() {
        let h = harness();
        h.blobs.fail_upload.store(true, Ordering::SeqCst);
        let assignment_id = AssignmentId::from_ulid(Ulid::new());

        let err = h
            .tether
            .submissions
            .upload_submission(new_submission(assignment_id, "s1"), Some(source_file()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialWriteFailure);

        let listed = h
            .tether
            .submissions
            .list_submissions_for_assignment(assignment_id, None)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].record.file_state, FileState::Failed);
    }

    #[tokio::test]
    async fn list_filters_by_assignment_and_optional_responder() {
        let h = harness();
        let coordinator = &h.tether.submissions;
        let a1 = AssignmentId::from_ulid(Ulid::new());
        let a2 = AssignmentId::from_ulid(Ulid::new());
        for (assignment_id, responder) in [(a1, "s1"), (a1, "s2"), (a1, "s1"), (a2, "s1")] {
            coordinator
                .upload_submission(new_submission(assignment_id, responder), Some(source_file()))
                .await
                .unwrap();
        }

        let all = coordinator.list_submissions_for_assignment(a1, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|e| e.has_access_url()));

        let mine = coordinator
            .list_submissions_for_assignment(a1, Some("s1"))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|e| e.record.responder_id == "s1"));

        let custom = coordinator
            .list_submissions_for_assignment_with_ttl(a2, None, Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(
            custom[0].access_url.as_ref().unwrap().expires_at,
            h.clock.now() + chrono::Duration::minutes(5)
        );
    }

    #[tokio::test]
    async fn review_flow_moves_forward() {
        let h = harness();
        let coordinator = &h.tether.submissions;
        let submission = coordinator
            .upload_submission(new_submission(AssignmentId::from_ulid(Ulid::new()), "s1"), None)
            .await
            .unwrap();

        let reviewing = coordinator
            .update_submission_status(submission.id, SubmissionStatus::UnderReview)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reviewing.status, SubmissionStatus::UnderReview);

        let accepted = coordinator
            .update_submission_status(submission.id, SubmissionStatus::Accepted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(accepted.status, SubmissionStatus::Accepted);

        let stored = coordinator.get_submission(submission.id).await.unwrap().unwrap();
        assert_eq!(stored.record.status, SubmissionStatus::Accepted);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_and_not_written() {
        let h = harness();
        let coordinator = &h.tether.submissions;
        let submission = coordinator
            .upload_submission(new_submission(AssignmentId::from_ulid(Ulid::new()), "s1"), None)
            .await
            .unwrap();

        let err = coordinator
            .update_submission_status(submission.id, SubmissionStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::IllegalTransition(IllegalTransition {
                from: SubmissionStatus::Submitted,
                to: SubmissionStatus::Accepted,
            })
        ));

        let stored = coordinator.get_submission(submission.id).await.unwrap().unwrap();
        assert_eq!(stored.record.status, SubmissionStatus::Submitted);
    }

    #[rstest]
    #[case(false, false)]
    #[case(true, true)]
    #[tokio::test]
    async fn re_review_follows_config(#[case] allow_re_review: bool, #[case] expect_ok: bool) {
        let h = harness_with(TetherConfig {
            allow_re_review,
            ..test_config()
        });
        let coordinator = &h.tether.submissions;
        let submission = coordinator
            .upload_submission(new_submission(AssignmentId::from_ulid(Ulid::new()), "s1"), None)
            .await
            .unwrap();
        for status in [SubmissionStatus::UnderReview, SubmissionStatus::Rejected] {
            coordinator
                .update_submission_status(submission.id, status)
                .await
                .unwrap();
        }

        let result = coordinator
            .update_submission_status(submission.id, SubmissionStatus::UnderReview)
            .await;
        assert_eq!(result.is_ok(), expect_ok);
    }

    #[tokio::test]
    async fn same_status_writes_nothing() {
        let h = harness();
        let coordinator = &h.tether.submissions;
        let submission = coordinator
            .upload_submission(new_submission(AssignmentId::from_ulid(Ulid::new()), "s1"), None)
            .await
            .unwrap();
        // update が失敗するストアでも、同じ状態なら書き込まないので成功する
        h.submission_store.fail_update.store(true, Ordering::SeqCst);

        let unchanged = coordinator
            .update_submission_status(submission.id, SubmissionStatus::Submitted)
            .await
            .unwrap();
        assert_eq!(unchanged, Some(submission));
    }

    #[tokio::test]
    async fn status_update_on_unknown_submission_is_noop() {
        let h = harness();
        let result = h
            .tether
            .submissions
            .update_submission_status(SubmissionId::from_ulid(Ulid::new()), SubmissionStatus::UnderReview)
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(h.submission_store.len().await, 0);
    }

    #[tokio::test]
    async fn status_update_store_failure_propagates() {
        let h = harness();
        let coordinator = &h.tether.submissions;
        let submission = coordinator
            .upload_submission(new_submission(AssignmentId::from_ulid(Ulid::new()), "s1"), None)
            .await
            .unwrap();
        h.submission_store.fail_update.store(true, Ordering::SeqCst);

        let err = coordinator
            .update_submission_status(submission.id, SubmissionStatus::UnderReview)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientStoreFailure);
    }

    #[tokio::test]
    async fn delete_submission_is_best_effort_on_objects() {
        let h = harness();
        let coordinator = &h.tether.submissions;
        let submission = coordinator
            .upload_submission(new_submission(AssignmentId::from_ulid(Ulid::new()), "s1"), Some(source_file()))
            .await
            .unwrap();
        h.blobs.fail_delete.store(true, Ordering::SeqCst);

        assert!(coordinator.delete_submission(submission.id).await.is_ok());
        assert!(coordinator.get_submission(submission.id).await.unwrap().is_none());
        assert!(coordinator.delete_submission(submission.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn download_file_after_object_vanished_is_none() {
        let h = harness();
        let coordinator = &h.tether.submissions;
        let submission = coordinator
            .upload_submission(new_submission(AssignmentId::from_ulid(Ulid::new()), "s1"), Some(source_file()))
            .await
            .unwrap();
        assert_eq!(
            coordinator.download_file(submission.id).await.unwrap(),
            Some(Bytes::from_static(b"fn main() {}"))
        );

        h.blobs
            .inner()
            .delete(coordinator.container(), submission.file_key.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(coordinator.download_file(submission.id).await.unwrap(), None);
    }
}
