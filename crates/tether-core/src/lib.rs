//! tether-core
//!
//! Keeps entity records and their attached files consistent across a
//! metadata store and an object store.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, assignment, submission, status, blob_key, file_state, access, errors）
//! - **ports**: 抽象化レイヤー（MetadataStore, ObjectStoreGateway, Clock, IdGenerator）
//! - **impls**: 実装（インメモリ / ローカルファイルシステム、URL 署名）
//! - **app**: コーディネータ、構築、プロビジョニング、reconciler、設定
//! - **observability**: tracing の初期化

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;
