//! ObjectStoreGateway port - Blob ストレージ（S3 / Azure Blob / Local）
//!
//! コンテナ（バケット）単位のオブジェクトストアを薄く包む。
//! キーの導出とタグ付けのポリシーはコーディネータ側の責務で、ここには含めない。

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BlobKey, BlobTags, ScopedUrl};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob {container}/{key} not found")]
    NotFound { container: String, key: String },

    #[error("object store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid container name '{0}'")]
    InvalidContainer(String),

    #[error("invalid key '{0}'")]
    InvalidKey(String),

    #[error("invalid url ttl: {0}")]
    InvalidTtl(String),

    #[error("failed to sign url: {0}")]
    Signing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tag encoding error: {0}")]
    Tags(#[from] serde_json::Error),
}

/// Handle returned by [`ObjectStoreGateway::ensure_container`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub name: String,
    /// `true` only for the caller whose create actually happened.
    pub created: bool,
}

/// Cross-origin rule applied to the whole object service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub max_age_secs: u32,
}

impl Default for CorsRule {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["PUT".to_string(), "GET".to_string(), "POST".to_string()],
            allowed_headers: vec!["*".to_string()],
            exposed_headers: vec!["*".to_string()],
            max_age_secs: 180,
        }
    }
}

/// ObjectStoreGateway はリモートの Blob サービスへのケイパビリティ
///
/// # 設計原則
/// - ensure_container は冪等。並行作成の競合で負けた側も成功扱い（存在を再確認）
/// - issue_scoped_url はキーがなければ `None`（ぶら下がった URL を返さない）
/// - タイムアウト・リトライは実装側の責務
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    async fn ensure_container(&self, container: &str) -> Result<ContainerHandle, BlobError>;

    async fn exists(&self, container: &str, key: &BlobKey) -> Result<bool, BlobError>;

    /// Store `content` under `key` (overwriting) and attach `tags`.
    /// Returns the public locator of the object (not a usable URL).
    async fn upload(
        &self,
        container: &str,
        key: &BlobKey,
        content: Bytes,
        tags: &BlobTags,
    ) -> Result<String, BlobError>;

    /// Returns `BlobError::NotFound` when the key is absent.
    async fn download(&self, container: &str, key: &BlobKey) -> Result<Bytes, BlobError>;

    /// `Ok(false)` when the key was already absent.
    async fn delete(&self, container: &str, key: &BlobKey) -> Result<bool, BlobError>;

    /// Read-only, time-bounded URL, or `None` when the key does not exist.
    async fn issue_scoped_url(
        &self,
        container: &str,
        key: &BlobKey,
        ttl: Duration,
    ) -> Result<Option<ScopedUrl>, BlobError>;

    /// Returns `BlobError::NotFound` when the key is absent.
    async fn tags(&self, container: &str, key: &BlobKey) -> Result<BlobTags, BlobError>;

    /// Keys under `prefix` (a partition), sorted.
    async fn list_keys(&self, container: &str, prefix: &str) -> Result<Vec<BlobKey>, BlobError>;

    /// Replace the service-wide CORS rules. Idempotent.
    async fn apply_cors(&self, rules: &[CorsRule]) -> Result<(), BlobError>;
}
