//! CoordinatorBuilder - コーディネータの構築とワイヤリング
//!
//! # 方針
//! - Builder パターン
//! - 起動時検証（Fail-fast）: 必要なストアが揃っていなければ build() で失敗
//! - 設定の検証も build() で行う

use std::sync::Arc;

use super::assignments::AssignmentCoordinator;
use super::config::{ConfigError, TetherConfig};
use super::lifecycle::{RecordLifecycle, UrlPolicy};
use super::provisioning::Provisioner;
use super::reconciler::Reconciler;
use super::submissions::SubmissionCoordinator;
use crate::domain::{Assignment, Submission, TransitionPolicy};
use crate::impls::{InMemoryMetadataStore, InMemoryObjectStore, UrlSigner};
use crate::ports::{BlobError, Clock, IdGenerator, MetadataStore, ObjectStoreGateway, UlidGenerator};

/// CoordinatorBuilder は Tether を構築
///
/// # 使用例
/// ```ignore
/// let tether = CoordinatorBuilder::new(config)
///     .assignment_store(assignments)
///     .submission_store(submissions)
///     .object_store(blobs)
///     .clock(clock)
///     .build()?;
/// ```
pub struct CoordinatorBuilder {
    config: TetherConfig,
    assignment_store: Option<Arc<dyn MetadataStore<Assignment>>>,
    submission_store: Option<Arc<dyn MetadataStore<Submission>>>,
    object_store: Option<Arc<dyn ObjectStoreGateway>>,
    clock: Option<Arc<dyn Clock>>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing components: {0:?}. These must be set before build().")]
    MissingComponents(Vec<&'static str>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot set up url signing: {0}")]
    Signer(#[from] BlobError),
}

impl CoordinatorBuilder {
    pub fn new(config: TetherConfig) -> Self {
        Self {
            config,
            assignment_store: None,
            submission_store: None,
            object_store: None,
            clock: None,
        }
    }

    /// In-memory stores for both record kinds and the object store.
    ///
    /// Components already set are replaced.
    pub fn in_memory(mut self, clock: Arc<dyn Clock>) -> Result<Self, BuildError> {
        let signer = UrlSigner::new(&self.config.public_base_url, &self.config.signing_secret)?;
        let id_gen: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let blobs = InMemoryObjectStore::new(signer, Arc::clone(&clock))
            .with_max_ttl(self.config.max_url_ttl());

        self.assignment_store = Some(Arc::new(InMemoryMetadataStore::<Assignment>::new(
            Arc::clone(&id_gen),
        )));
        self.submission_store = Some(Arc::new(InMemoryMetadataStore::<Submission>::new(id_gen)));
        self.object_store = Some(Arc::new(blobs));
        self.clock = Some(clock);
        Ok(self)
    }

    pub fn assignment_store(mut self, store: Arc<dyn MetadataStore<Assignment>>) -> Self {
        self.assignment_store = Some(store);
        self
    }

    pub fn submission_store(mut self, store: Arc<dyn MetadataStore<Submission>>) -> Self {
        self.submission_store = Some(store);
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStoreGateway>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # 検証
    /// - 設定値（TTL、コンテナ名の重複、署名鍵）
    /// - 全コンポーネントが設定済みか。不足分は BuildError::MissingComponents にまとめて返す
    pub fn build(self) -> Result<Tether, BuildError> {
        self.config.validate()?;

        let mut missing = Vec::new();
        if self.assignment_store.is_none() {
            missing.push("assignment_store");
        }
        if self.submission_store.is_none() {
            missing.push("submission_store");
        }
        if self.object_store.is_none() {
            missing.push("object_store");
        }
        if self.clock.is_none() {
            missing.push("clock");
        }
        let (Some(assignment_store), Some(submission_store), Some(blobs), Some(clock)) = (
            self.assignment_store,
            self.submission_store,
            self.object_store,
            self.clock,
        ) else {
            return Err(BuildError::MissingComponents(missing));
        };

        let config = self.config;
        let urls = UrlPolicy {
            default_ttl: config.default_url_ttl(),
            max_ttl: config.max_url_ttl(),
        };
        let assignments = RecordLifecycle {
            store: assignment_store,
            blobs: Arc::clone(&blobs),
            container: config.assignment_container.clone(),
            urls,
        };
        let submissions = RecordLifecycle {
            store: submission_store,
            blobs: Arc::clone(&blobs),
            container: config.submission_container.clone(),
            urls,
        };

        Ok(Tether {
            reconciler: Reconciler::new(
                assignments.clone(),
                submissions.clone(),
                Arc::clone(&clock),
                config.reconcile_grace(),
            ),
            provisioner: Provisioner::new(
                Arc::clone(&blobs),
                vec![
                    config.assignment_container.clone(),
                    config.submission_container.clone(),
                ],
                config.cors.clone(),
            ),
            assignments: AssignmentCoordinator::new(assignments, Arc::clone(&clock)),
            submissions: SubmissionCoordinator::new(
                submissions,
                clock,
                TransitionPolicy::new(config.allow_re_review),
            ),
            object_store: blobs,
        })
    }
}

/// Tether は構築済みのコーディネータ一式
pub struct Tether {
    pub assignments: AssignmentCoordinator,
    pub submissions: SubmissionCoordinator,
    pub provisioner: Provisioner,
    pub reconciler: Reconciler,
    pub object_store: Arc<dyn ObjectStoreGateway>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SystemClock;

    fn config() -> TetherConfig {
        TetherConfig {
            signing_secret: "test-secret".to_string(),
            ..TetherConfig::default()
        }
    }

    #[test]
    fn build_success_with_in_memory_components() {
        let tether = CoordinatorBuilder::new(config())
            .in_memory(Arc::new(SystemClock))
            .unwrap()
            .build();
        assert!(tether.is_ok());
    }

    #[test]
    fn build_reports_every_missing_component() {
        let result = CoordinatorBuilder::new(config())
            .clock(Arc::new(SystemClock))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingComponents(missing))
                if missing == vec!["assignment_store", "submission_store", "object_store"]
        ));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let result = CoordinatorBuilder::new(TetherConfig::default())
            .in_memory(Arc::new(SystemClock));
        // 署名鍵が空でも UrlSigner は作れる。検証は build() で落ちる
        let result = result.and_then(CoordinatorBuilder::build);
        assert!(matches!(result, Err(BuildError::Config(ConfigError::Missing(_)))));
    }
}
