//! IdGenerator port - レコード ID 生成の抽象化
//!
//! メタデータストアが insert 時にこれを使って採番する。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use std::sync::Arc;

use crate::domain::ids::{Id, IdMarker};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は分散環境で使える ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから共有される）
pub trait IdGenerator: Send + Sync {
    fn next_ulid(&self) -> Ulid;
}

/// 型付き ID を生成するヘルパー
pub fn generate<T: IdMarker>(id_gen: &dyn IdGenerator) -> Id<T> {
    Id::from_ulid(id_gen.next_ulid())
}

/// UlidGenerator は Clock の時刻 + 80bit 乱数で ULID を作る
///
/// FixedClock を渡すと timestamp 部分が決定的になる。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}
