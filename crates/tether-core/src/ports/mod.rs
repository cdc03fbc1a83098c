//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。コーディネータが外部システムに
//! 求めるインターフェースだけを定義する。
//!
//! # 前提
//! - メタデータストアが正本（source of truth）
//! - オブジェクトストアはファイル本体の保存先
//! - 両者に共有トランザクションはない（整合性は best-effort / eventual）

pub mod clock;
pub mod id_generator;
pub mod metadata_store;
pub mod object_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::metadata_store::{MetadataStore, Predicate, StoreError};
pub use self::object_store::{BlobError, ContainerHandle, CorsRule, ObjectStoreGateway};
