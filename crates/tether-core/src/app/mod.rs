//! App - アプリケーション層
//!
//! ports を組み合わせて、メタデータと添付ファイルの一貫性を保つ。
//!
//! # 主要コンポーネント
//! - **CoordinatorBuilder**: 構築とワイヤリング（fail-fast）
//! - **AssignmentCoordinator** / **SubmissionCoordinator**: レコード + ファイルの操作
//! - **Provisioner**: コンテナと CORS の明示的な準備
//! - **Reconciler**: 中断された添付の後始末
//! - **TetherConfig**: デプロイ時の設定

pub mod assignments;
pub mod builder;
pub mod config;
pub(crate) mod lifecycle;
pub mod provisioning;
pub mod reconciler;
pub mod submissions;

pub use self::assignments::AssignmentCoordinator;
pub use self::builder::{BuildError, CoordinatorBuilder, Tether};
pub use self::config::{ConfigError, TetherConfig};
pub use self::lifecycle::UrlPolicy;
pub use self::provisioning::{ProvisionReport, Provisioner};
pub use self::reconciler::{ReconcileReport, Reconciler, ReconcilerHandle};
pub use self::submissions::SubmissionCoordinator;
