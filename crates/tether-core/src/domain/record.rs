//! Record - メタデータストアに保存できるレコードの共通 trait
//!
//! ID はストアが insert 時に採番する。呼び出し側は Draft（ID なし）を渡し、
//! ストアは ID を付けたレコードを返す。

use chrono::{DateTime, Utc};

use super::blob_key::BlobKey;
use super::file_state::FileState;
use super::ids::{Id, IdMarker};

pub trait Record: Clone + Send + Sync + 'static {
    type Marker: IdMarker;

    /// ID 採番前の形
    type Draft: Send + 'static;

    fn from_draft(id: Id<Self::Marker>, draft: Self::Draft) -> Self;

    fn id(&self) -> Id<Self::Marker>;

    /// 作成時刻（reconciler の猶予判定に使う）
    fn created_at(&self) -> DateTime<Utc>;

    fn file_key(&self) -> Option<&BlobKey>;

    fn file_state(&self) -> FileState;

    fn set_file_state(&mut self, state: FileState);
}
