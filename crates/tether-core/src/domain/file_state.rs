//! FileState - メタデータと Blob の二段階書き込みの状態
//!
//! メタデータストアとオブジェクトストアは同じトランザクションに入らない。
//! そこで「ファイル待ち」を記録してからアップロードし、結果で遷移させる。
//! 孤立したメタデータ（Failed / 長時間 Pending）は Reconciler が拾える。
//!
//! # 状態遷移
//! - None: ファイルなし（終端）
//! - Pending -> Attached: アップロード成功
//! - Pending -> Failed: アップロード失敗
//! - Failed -> Attached: Reconciler が Blob の存在を確認した場合

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// No file was attached.
    #[default]
    None,

    /// Metadata persisted, upload not yet confirmed.
    Pending,

    /// Upload accepted by the object store.
    Attached,

    /// Upload failed after metadata was persisted (orphaned metadata).
    Failed,
}

impl FileState {
    /// Does the record need the reconciler's attention?
    pub fn needs_reconcile(self) -> bool {
        matches!(self, FileState::Pending | FileState::Failed)
    }
}
