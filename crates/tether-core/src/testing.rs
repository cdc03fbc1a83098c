//! テスト用のダブルとハーネス
//!
//! - RecordingObjectStore: InMemoryObjectStore をラップし、upload 呼び出しを記録。障害注入可
//! - FaultyMetadataStore: InMemoryMetadataStore をラップし、insert / update に障害注入可。
//!   find_by の直後に別の書き手の削除・更新を割り込ませることもできる

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};

use crate::app::{CoordinatorBuilder, Tether, TetherConfig};
use crate::domain::{Assignment, BlobKey, BlobTags, Id, Record, ScopedUrl, Submission};
use crate::impls::{InMemoryMetadataStore, InMemoryObjectStore, UrlSigner};
use crate::ports::{
    BlobError, Clock, ContainerHandle, CorsRule, FixedClock, IdGenerator, MetadataStore,
    ObjectStoreGateway, Predicate, StoreError, UlidGenerator,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadCall {
    pub container: String,
    pub key: BlobKey,
    pub size: usize,
    pub tags: BlobTags,
}

pub(crate) struct RecordingObjectStore {
    inner: InMemoryObjectStore,
    uploads: Mutex<Vec<UploadCall>>,
    pub fail_upload: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_urls: AtomicBool,
}

impl RecordingObjectStore {
    pub fn new(inner: InMemoryObjectStore) -> Self {
        Self {
            inner,
            uploads: Mutex::new(Vec::new()),
            fail_upload: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_urls: AtomicBool::new(false),
        }
    }

    pub fn uploads(&self) -> Vec<UploadCall> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn inner(&self) -> &InMemoryObjectStore {
        &self.inner
    }
}

fn unavailable(op: &str) -> BlobError {
    BlobError::Unavailable(format!("injected {op} failure"))
}

#[async_trait]
impl ObjectStoreGateway for RecordingObjectStore {
    async fn ensure_container(&self, container: &str) -> Result<ContainerHandle, BlobError> {
        self.inner.ensure_container(container).await
    }

    async fn exists(&self, container: &str, key: &BlobKey) -> Result<bool, BlobError> {
        self.inner.exists(container, key).await
    }

    async fn upload(
        &self,
        container: &str,
        key: &BlobKey,
        content: Bytes,
        tags: &BlobTags,
    ) -> Result<String, BlobError> {
        self.uploads.lock().unwrap().push(UploadCall {
            container: container.to_string(),
            key: key.clone(),
            size: content.len(),
            tags: tags.clone(),
        });
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(unavailable("upload"));
        }
        self.inner.upload(container, key, content, tags).await
    }

    async fn download(&self, container: &str, key: &BlobKey) -> Result<Bytes, BlobError> {
        self.inner.download(container, key).await
    }

    async fn delete(&self, container: &str, key: &BlobKey) -> Result<bool, BlobError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(unavailable("delete"));
        }
        self.inner.delete(container, key).await
    }

    async fn issue_scoped_url(
        &self,
        container: &str,
        key: &BlobKey,
        ttl: Duration,
    ) -> Result<Option<ScopedUrl>, BlobError> {
        if self.fail_urls.load(Ordering::SeqCst) {
            return Err(unavailable("url"));
        }
        self.inner.issue_scoped_url(container, key, ttl).await
    }

    async fn tags(&self, container: &str, key: &BlobKey) -> Result<BlobTags, BlobError> {
        self.inner.tags(container, key).await
    }

    async fn list_keys(&self, container: &str, prefix: &str) -> Result<Vec<BlobKey>, BlobError> {
        self.inner.list_keys(container, prefix).await
    }

    async fn apply_cors(&self, rules: &[CorsRule]) -> Result<(), BlobError> {
        self.inner.apply_cors(rules).await
    }
}

type RecordEdit<R> = Box<dyn FnOnce(&mut R) + Send>;

pub(crate) struct FaultyMetadataStore<R: Record> {
    inner: InMemoryMetadataStore<R>,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_reads: AtomicBool,
    /// Delete the first record of the next `find_by` result after returning it.
    pub delete_after_find: AtomicBool,
    edit_after_find: Mutex<Option<RecordEdit<R>>>,
}

impl<R: Record> FaultyMetadataStore<R> {
    pub fn new(id_gen: Arc<dyn IdGenerator>) -> Self {
        Self {
            inner: InMemoryMetadataStore::new(id_gen),
            fail_insert: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            delete_after_find: AtomicBool::new(false),
            edit_after_find: Mutex::new(None),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    /// Rewrite the stored copy of the first record of the next `find_by` result.
    pub fn edit_after_find(&self, edit: impl FnOnce(&mut R) + Send + 'static) {
        *self.edit_after_find.lock().unwrap() = Some(Box::new(edit));
    }
}

#[async_trait]
impl<R: Record> MetadataStore<R> for FaultyMetadataStore<R> {
    async fn insert(&self, draft: R::Draft) -> Result<R, StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected insert failure".into()));
        }
        self.inner.insert(draft).await
    }

    async fn get_by_id(&self, id: Id<R::Marker>) -> Result<Option<R>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        self.inner.get_by_id(id).await
    }

    async fn find_by(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        let found = self.inner.find_by(predicate).await?;
        if let Some(first) = found.first() {
            if self.delete_after_find.swap(false, Ordering::SeqCst) {
                self.inner.delete(first.id()).await?;
            }
            let edit = self.edit_after_find.lock().unwrap().take();
            if let Some(edit) = edit {
                let mut current = first.clone();
                edit(&mut current);
                self.inner.update(current).await?;
            }
        }
        Ok(found)
    }

    async fn update(&self, record: R) -> Result<(), StoreError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected update failure".into()));
        }
        self.inner.update(record).await
    }

    async fn delete(&self, id: Id<R::Marker>) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

/// Coordinators wired to the doubles, sharing one fixed clock.
pub(crate) struct Harness {
    pub tether: Tether,
    pub blobs: Arc<RecordingObjectStore>,
    pub assignment_store: Arc<FaultyMetadataStore<Assignment>>,
    pub submission_store: Arc<FaultyMetadataStore<Submission>>,
    pub clock: Arc<FixedClock>,
    pub config: TetherConfig,
}

pub(crate) fn test_config() -> TetherConfig {
    TetherConfig {
        signing_secret: "test-secret".to_string(),
        ..TetherConfig::default()
    }
}

pub(crate) fn harness() -> Harness {
    harness_with(test_config())
}

pub(crate) fn harness_with(config: TetherConfig) -> Harness {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap(),
    ));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let id_gen: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(dyn_clock.clone()));

    let signer = UrlSigner::new(&config.public_base_url, &config.signing_secret).unwrap();
    let blobs = Arc::new(RecordingObjectStore::new(InMemoryObjectStore::new(
        signer,
        dyn_clock.clone(),
    )));
    let assignment_store = Arc::new(FaultyMetadataStore::<Assignment>::new(id_gen.clone()));
    let submission_store = Arc::new(FaultyMetadataStore::<Submission>::new(id_gen));

    let tether = CoordinatorBuilder::new(config.clone())
        .assignment_store(assignment_store.clone())
        .submission_store(submission_store.clone())
        .object_store(blobs.clone())
        .clock(dyn_clock)
        .build()
        .unwrap();

    Harness {
        tether,
        blobs,
        assignment_store,
        submission_store,
        clock,
        config,
    }
}
