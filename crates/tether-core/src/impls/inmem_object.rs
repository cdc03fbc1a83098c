//! InMemoryObjectStore - 開発用・テスト用のオブジェクトストア
//!
//! # 実装詳細
//! - container ごとに BTreeMap<key, object>（prefix 検索のため順序付き）
//! - tokio の RwLock で排他制御。ensure_container の競合は lock で直列化される
//! - scoped URL は UrlSigner で署名（実ストアの presign と同じく URL 単体で完結）

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use super::UrlSigner;
use crate::domain::access::{expires_after, validate_ttl};
use crate::domain::{BlobKey, BlobTags, MAX_URL_TTL, ScopedUrl};
use crate::ports::{BlobError, Clock, ContainerHandle, CorsRule, ObjectStoreGateway};

#[derive(Debug, Clone)]
struct StoredObject {
    content: Bytes,
    tags: BlobTags,
}

#[derive(Debug, Default)]
struct State {
    containers: HashMap<String, BTreeMap<String, StoredObject>>,
    cors: Vec<CorsRule>,
}

pub struct InMemoryObjectStore {
    state: RwLock<State>,
    signer: UrlSigner,
    clock: Arc<dyn Clock>,
    max_ttl: Duration,
}

impl InMemoryObjectStore {
    pub fn new(signer: UrlSigner, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            signer,
            clock,
            max_ttl: MAX_URL_TTL,
        }
    }

    pub fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = max_ttl;
        self
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// CORS rules currently applied.
    pub async fn cors_rules(&self) -> Vec<CorsRule> {
        self.state.read().await.cors.clone()
    }

    pub async fn object_count(&self, container: &str) -> usize {
        self.state
            .read()
            .await
            .containers
            .get(container)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl ObjectStoreGateway for InMemoryObjectStore {
    async fn ensure_container(&self, container: &str) -> Result<ContainerHandle, BlobError> {
        super::validate_container_name(container)?;
        let mut state = self.state.write().await;
        let created = !state.containers.contains_key(container);
        if created {
            state.containers.insert(container.to_string(), BTreeMap::new());
            debug!(container, "container created");
        }
        Ok(ContainerHandle {
            name: container.to_string(),
            created,
        })
    }

    async fn exists(&self, container: &str, key: &BlobKey) -> Result<bool, BlobError> {
        let state = self.state.read().await;
        Ok(state
            .containers
            .get(container)
            .is_some_and(|objects| objects.contains_key(key.as_str())))
    }

    async fn upload(
        &self,
        container: &str,
        key: &BlobKey,
        content: Bytes,
        tags: &BlobTags,
    ) -> Result<String, BlobError> {
        super::validate_container_name(container)?;
        let mut state = self.state.write().await;
        // 実ストアのクライアントと同じく、コンテナがなければ作る
        let objects = state.containers.entry(container.to_string()).or_default();
        objects.insert(
            key.as_str().to_string(),
            StoredObject {
                content,
                tags: tags.clone(),
            },
        );
        Ok(format!("memory://{}/{}", container, key))
    }

    async fn download(&self, container: &str, key: &BlobKey) -> Result<Bytes, BlobError> {
        let state = self.state.read().await;
        state
            .containers
            .get(container)
            .and_then(|objects| objects.get(key.as_str()))
            .map(|object| object.content.clone())
            .ok_or_else(|| BlobError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    async fn delete(&self, container: &str, key: &BlobKey) -> Result<bool, BlobError> {
        let mut state = self.state.write().await;
        Ok(state
            .containers
            .get_mut(container)
            .and_then(|objects| objects.remove(key.as_str()))
            .is_some())
    }

    async fn issue_scoped_url(
        &self,
        container: &str,
        key: &BlobKey,
        ttl: Duration,
    ) -> Result<Option<ScopedUrl>, BlobError> {
        validate_ttl(ttl, self.max_ttl).map_err(BlobError::InvalidTtl)?;
        if !self.exists(container, key).await? {
            return Ok(None);
        }
        let expires_at = expires_after(self.clock.now(), ttl).map_err(BlobError::InvalidTtl)?;
        self.signer.sign(container, key, expires_at).map(Some)
    }

    async fn tags(&self, container: &str, key: &BlobKey) -> Result<BlobTags, BlobError> {
        let state = self.state.read().await;
        state
            .containers
            .get(container)
            .and_then(|objects| objects.get(key.as_str()))
            .map(|object| object.tags.clone())
            .ok_or_else(|| BlobError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    async fn list_keys(&self, container: &str, prefix: &str) -> Result<Vec<BlobKey>, BlobError> {
        let state = self.state.read().await;
        let Some(objects) = state.containers.get(container) else {
            return Ok(Vec::new());
        };
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| BlobKey::from_existing(key.clone()))
            .collect())
    }

    async fn apply_cors(&self, rules: &[CorsRule]) -> Result<(), BlobError> {
        self.state.write().await.cors = rules.to_vec();
        Ok(())
    }
}
