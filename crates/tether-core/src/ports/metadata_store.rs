//! MetadataStore port - レコードの正本（source of truth）
//!
//! キー付きドキュメントストア / 行ストアなら何でも実装できる:
//! - insert（ID はストアが採番）
//! - get_by_id / find_by（述語フィルタ）
//! - update / delete
//!
//! # 設計原則
//! - 単一レコード単位で atomic
//! - レコードをまたぐトランザクションはない（Blob とも共有しない）
//! - 楽観的排他制御はない。delete と update が競合すると update が失われうる

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Id, Record};

/// Predicate used by [`MetadataStore::find_by`].
pub type Predicate<'a, R> = &'a (dyn Fn(&R) -> bool + Send + Sync);

#[derive(Debug, Error)]
pub enum StoreError {
    /// update の対象が存在しない
    #[error("record {0} does not exist")]
    NotFound(String),

    /// ネットワーク・ストア停止など
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait]
pub trait MetadataStore<R: Record>: Send + Sync {
    /// Persist a new record and return it with the id the store assigned.
    async fn insert(&self, draft: R::Draft) -> Result<R, StoreError>;

    async fn get_by_id(&self, id: Id<R::Marker>) -> Result<Option<R>, StoreError>;

    async fn find_by(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>, StoreError>;

    /// Replace the stored record with the same id.
    ///
    /// Returns `StoreError::NotFound` when no such record exists.
    async fn update(&self, record: R) -> Result<(), StoreError>;

    /// Remove a record. Deleting an absent id is not an error.
    async fn delete(&self, id: Id<R::Marker>) -> Result<(), StoreError>;
}
