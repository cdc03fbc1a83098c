//! Errors - コーディネータのエラー型と分類
//!
//! ストア層の失敗はそのまま伝播する（このレイヤではリトライしない）。
//! 例外は 2 つだけ:
//! - NotFound: delete / update では Result / Option で表現し、list では空の結果
//! - DanglingReference: エラーにせず「URL なし」に落とす（そもそもここに現れない）

use std::time::Duration;

use thiserror::Error;

use super::blob_key::BlobKey;
use super::status::IllegalTransition;
use crate::ports::{BlobError, StoreError};

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 参照先のメタデータが存在しない
    NotFound,
    /// ストアの一時的な障害（呼び出し側でリトライ可）
    TransientStoreFailure,
    /// メタデータは書けたがアップロードに失敗（孤立メタデータ）
    PartialWriteFailure,
    /// 入力が不正（状態遷移・TTL）
    Rejected,
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("record {0} not found")]
    NotFound(String),

    #[error("metadata store failure: {0}")]
    Store(#[from] StoreError),

    #[error("object store failure: {0}")]
    Blob(#[from] BlobError),

    /// The metadata record `record_id` was committed and references `key`,
    /// but the upload did not go through. No rollback happened.
    #[error("record {record_id} persisted but upload of {key} failed: {source}")]
    PartialWrite {
        record_id: String,
        key: BlobKey,
        #[source]
        source: BlobError,
    },

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("invalid url ttl {ttl:?}: {reason}")]
    InvalidTtl { ttl: Duration, reason: String },
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoordinatorError::NotFound(_) => ErrorKind::NotFound,
            CoordinatorError::Store(_) | CoordinatorError::Blob(_) => {
                ErrorKind::TransientStoreFailure
            }
            CoordinatorError::PartialWrite { .. } => ErrorKind::PartialWriteFailure,
            CoordinatorError::IllegalTransition(_) | CoordinatorError::InvalidTtl { .. } => {
                ErrorKind::Rejected
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
