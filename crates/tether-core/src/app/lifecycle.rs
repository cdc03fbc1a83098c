//! RecordLifecycle - レコードと添付ファイルをまとめて扱う共通処理
//!
//! Assignment / Submission の両方がこれを使う。
//!
//! # 作成（saga）
//! 1. レコードを `file_state = Pending` で insert（失敗したらアップロードしない）
//! 2. アップロード
//! 3. 成功 → `Attached` に更新 / 失敗 → `Failed` に更新して `PartialWrite`
//!
//! ロールバックはしない。`Pending` のまま残ったものは Reconciler が拾う。
//!
//! # 削除
//! メタデータが正。ファイル削除の失敗はログに残すだけで、メタデータは必ず消す。

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::domain::access::validate_ttl;
use crate::domain::{BlobTags, CoordinatorError, Enriched, FileState, Id, Record};
use crate::ports::{BlobError, MetadataStore, ObjectStoreGateway, Predicate};

/// Scoped URL settings for one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlPolicy {
    pub default_ttl: Duration,
    pub max_ttl: Duration,
}

impl UrlPolicy {
    pub fn check(&self, ttl: Duration) -> Result<(), CoordinatorError> {
        validate_ttl(ttl, self.max_ttl).map_err(|reason| CoordinatorError::InvalidTtl { ttl, reason })
    }
}

pub(crate) struct RecordLifecycle<R: Record> {
    pub(crate) store: Arc<dyn MetadataStore<R>>,
    pub(crate) blobs: Arc<dyn ObjectStoreGateway>,
    pub(crate) container: String,
    pub(crate) urls: UrlPolicy,
}

impl<R: Record> Clone for RecordLifecycle<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            blobs: Arc::clone(&self.blobs),
            container: self.container.clone(),
            urls: self.urls,
        }
    }
}

impl<R: Record> RecordLifecycle<R> {
    /// Insert `draft`, then upload `content` to the key the draft references.
    ///
    /// `content` is ignored when the draft carries no file key.
    pub(crate) async fn create(
        &self,
        draft: R::Draft,
        content: Option<Bytes>,
        tags_for: impl FnOnce(&R) -> BlobTags + Send,
    ) -> Result<R, CoordinatorError> {
        let mut record = self.store.insert(draft).await?;
        let id = record.id();

        let (Some(key), Some(content)) = (record.file_key().cloned(), content) else {
            debug!(record_id = %id, "record created without file");
            return Ok(record);
        };

        let tags = tags_for(&record);
        let size_bytes = content.len();
        match self.blobs.upload(&self.container, &key, content, &tags).await {
            Ok(locator) => {
                record.set_file_state(FileState::Attached);
                if let Err(e) = self.store.update(record.clone()).await {
                    // ファイルは置けている。Pending のまま残し、reconciler に任せる
                    warn!(record_id = %id, %key, error = %e, "upload succeeded but attach update failed");
                    record.set_file_state(FileState::Pending);
                }
                info!(record_id = %id, %key, %locator, size_bytes, "file attached");
                Ok(record)
            }
            Err(source) => {
                record.set_file_state(FileState::Failed);
                if let Err(e) = self.store.update(record).await {
                    warn!(record_id = %id, %key, error = %e, "could not mark upload as failed");
                }
                warn!(record_id = %id, %key, error = %source, "upload failed after record was persisted");
                Err(CoordinatorError::PartialWrite {
                    record_id: id.to_string(),
                    key,
                    source,
                })
            }
        }
    }

    pub(crate) async fn get(&self, id: Id<R::Marker>) -> Result<Option<R>, CoordinatorError> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub(crate) async fn find(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>, CoordinatorError> {
        Ok(self.store.find_by(predicate).await?)
    }

    /// Attach a scoped URL to each record whose file still exists.
    pub(crate) async fn enrich(
        &self,
        records: Vec<R>,
        ttl: Duration,
    ) -> Result<Vec<Enriched<R>>, CoordinatorError> {
        self.urls.check(ttl)?;
        let mut enriched = Vec::with_capacity(records.len());
        for record in records {
            let access_url = self.access_url(&record, ttl).await?;
            enriched.push(Enriched::new(record, access_url));
        }
        Ok(enriched)
    }

    async fn access_url(
        &self,
        record: &R,
        ttl: Duration,
    ) -> Result<Option<crate::domain::ScopedUrl>, CoordinatorError> {
        let Some(key) = record.file_key() else {
            return Ok(None);
        };
        match self.blobs.issue_scoped_url(&self.container, key, ttl).await {
            Ok(Some(url)) => Ok(Some(url)),
            Ok(None) | Err(BlobError::NotFound { .. }) => {
                debug!(record_id = %record.id(), %key, "file key does not resolve, no url issued");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `Ok(None)` when the record is unknown or carries no file.
    pub(crate) async fn download(&self, id: Id<R::Marker>) -> Result<Option<Bytes>, CoordinatorError> {
        let Some(record) = self.store.get_by_id(id).await? else {
            return Ok(None);
        };
        let Some(key) = record.file_key() else {
            return Ok(None);
        };
        match self.blobs.download(&self.container, key).await {
            Ok(content) => Ok(Some(content)),
            Err(BlobError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the record and, best-effort, its file.
    ///
    /// `Err(NotFound)` when the record does not exist. A failed file delete
    /// never blocks the metadata delete.
    pub(crate) async fn delete(&self, id: Id<R::Marker>) -> Result<(), CoordinatorError> {
        let record = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoordinatorError::NotFound(id.to_string()))?;

        if let Some(key) = record.file_key() {
            match self.blobs.delete(&self.container, key).await {
                Ok(true) => debug!(record_id = %id, %key, "file deleted"),
                Ok(false) => debug!(record_id = %id, %key, "file already absent"),
                Err(e) => warn!(record_id = %id, %key, error = %e, "file delete failed, object left orphaned"),
            }
        }

        self.store.delete(id).await?;
        info!(record_id = %id, "record deleted");
        Ok(())
    }
}
