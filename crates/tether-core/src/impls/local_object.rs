//! Local filesystem object store.
//!
//! Layout under `root`:
//! - `<container>/objects/<key>`: object bytes
//! - `<container>/tags/<key>.json`: tags
//! - `cors.json`: service-wide CORS rules
//!
//! Scoped URLs are signed with the same [`UrlSigner`] as the in-memory store;
//! something in front of the directory has to verify them.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use super::UrlSigner;
use crate::domain::access::{expires_after, validate_ttl};
use crate::domain::{BlobKey, BlobTags, MAX_URL_TTL, ScopedUrl};
use crate::ports::{BlobError, Clock, ContainerHandle, CorsRule, ObjectStoreGateway};

const OBJECTS_DIR: &str = "objects";
const TAGS_DIR: &str = "tags";

pub struct LocalObjectStore {
    root: PathBuf,
    signer: UrlSigner,
    clock: Arc<dyn Clock>,
    max_ttl: Duration,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, signer: UrlSigner, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            signer,
            clock,
            max_ttl: MAX_URL_TTL,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, BlobError> {
        super::validate_container_name(container)?;
        Ok(self.root.join(container))
    }

    fn object_path(&self, container: &str, key: &BlobKey) -> Result<PathBuf, BlobError> {
        Ok(self
            .container_dir(container)?
            .join(OBJECTS_DIR)
            .join(relative_key(key)?))
    }

    fn tags_path(&self, container: &str, key: &BlobKey) -> Result<PathBuf, BlobError> {
        let mut path = self
            .container_dir(container)?
            .join(TAGS_DIR)
            .join(relative_key(key)?)
            .into_os_string();
        path.push(".json");
        Ok(PathBuf::from(path))
    }

    fn not_found(container: &str, key: &BlobKey) -> BlobError {
        BlobError::NotFound {
            container: container.to_string(),
            key: key.to_string(),
        }
    }
}

/// Keys must stay inside the container directory.
fn relative_key(key: &BlobKey) -> Result<&Path, BlobError> {
    let path = Path::new(key.as_str());
    let escapes = key.as_str().is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(path)
}

fn map_not_found(err: std::io::Error, container: &str, key: &BlobKey) -> BlobError {
    if err.kind() == std::io::ErrorKind::NotFound {
        LocalObjectStore::not_found(container, key)
    } else {
        BlobError::Io(err)
    }
}

#[async_trait]
impl ObjectStoreGateway for LocalObjectStore {
    async fn ensure_container(&self, container: &str) -> Result<ContainerHandle, BlobError> {
        let dir = self.container_dir(container)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let created = match tokio::fs::create_dir(&dir).await {
            Ok(()) => true,
            // 競合で負けた側: 存在を再確認して成功扱い
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if !tokio::fs::metadata(&dir).await?.is_dir() {
                    return Err(BlobError::InvalidContainer(container.to_string()));
                }
                false
            }
            Err(e) => return Err(e.into()),
        };
        tokio::fs::create_dir_all(dir.join(OBJECTS_DIR)).await?;
        tokio::fs::create_dir_all(dir.join(TAGS_DIR)).await?;

        if created {
            info!(container, root = %self.root.display(), "container created");
        }
        Ok(ContainerHandle {
            name: container.to_string(),
            created,
        })
    }

    async fn exists(&self, container: &str, key: &BlobKey) -> Result<bool, BlobError> {
        let path = self.object_path(container, key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(
        &self,
        container: &str,
        key: &BlobKey,
        content: Bytes,
        tags: &BlobTags,
    ) -> Result<String, BlobError> {
        let object_path = self.object_path(container, key)?;
        let tags_path = self.tags_path(container, key)?;

        for path in [&object_path, &tags_path] {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&object_path, &content).await?;
        tokio::fs::write(&tags_path, serde_json::to_vec(tags)?).await?;
        debug!(container, %key, size_bytes = content.len(), "object written");

        Ok(format!("file://{}", object_path.display()))
    }

    async fn download(&self, container: &str, key: &BlobKey) -> Result<Bytes, BlobError> {
        let path = self.object_path(container, key)?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| map_not_found(e, container, key))
    }

    async fn delete(&self, container: &str, key: &BlobKey) -> Result<bool, BlobError> {
        let path = self.object_path(container, key)?;
        let removed = match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match tokio::fs::remove_file(self.tags_path(container, key)?).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(removed)
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
        let path = self.tags_path(container, key)?;
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| map_not_found(e, container, key))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn list_keys(&self, container: &str, prefix: &str) -> Result<Vec<BlobKey>, BlobError> {
        let base = self.container_dir(container)?.join(OBJECTS_DIR);
        let mut keys = Vec::new();
        let mut pending = vec![base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&base) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(BlobKey::from_existing(key));
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn apply_cors(&self, rules: &[CorsRule]) -> Result<(), BlobError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join("cors.json"), serde_json::to_vec_pretty(rules)?).await?;
        Ok(())
    }
}
