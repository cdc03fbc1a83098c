//! Reconciler - 中断された添付 saga の後始末
//!
//! `Pending` / `Failed` のレコードを走査して、オブジェクトストアの実態に合わせる。
//! - オブジェクトがある → `Attached`
//! - ない & `Pending` & 猶予期間を過ぎた → `Failed`
//! - ない & `Failed` → そのまま（orphan として数えるだけ）
//!
//! メタデータは決して削除しない。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::lifecycle::RecordLifecycle;
use crate::domain::{Assignment, CoordinatorError, FileState, Record, Submission};
use crate::ports::{Clock, StoreError};

/// Counts from one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub attached: usize,
    pub failed: usize,
    /// Still `Failed` with no object behind the key.
    pub orphaned: usize,
    /// `Pending` and still inside the grace period.
    pub waiting: usize,
}

impl ReconcileReport {
    fn merge(mut self, other: ReconcileReport) -> Self {
        self.examined += other.examined;
        self.attached += other.attached;
        self.failed += other.failed;
        self.orphaned += other.orphaned;
        self.waiting += other.waiting;
        self
    }
}

#[derive(Clone)]
pub struct Reconciler {
    assignments: RecordLifecycle<Assignment>,
    submissions: RecordLifecycle<Submission>,
    clock: Arc<dyn Clock>,
    grace: Duration,
}

impl Reconciler {
    pub(crate) fn new(
        assignments: RecordLifecycle<Assignment>,
        submissions: RecordLifecycle<Submission>,
        clock: Arc<dyn Clock>,
        grace: Duration,
    ) -> Self {
        Self {
            assignments,
            submissions,
            clock,
            grace,
        }
    }

    pub async fn reconcile_once(&self) -> Result<ReconcileReport, CoordinatorError> {
        let assignments = self.reconcile(&self.assignments).await?;
        let submissions = self.reconcile(&self.submissions).await?;
        let report = assignments.merge(submissions);
        if report.attached > 0 || report.failed > 0 {
            info!(?report, "reconcile pass changed records");
        } else {
            debug!(?report, "reconcile pass");
        }
        Ok(report)
    }

    async fn reconcile<R: Record>(
        &self,
        lifecycle: &RecordLifecycle<R>,
    ) -> Result<ReconcileReport, CoordinatorError> {
        let candidates = lifecycle
            .find(&|r: &R| r.file_state().needs_reconcile())
            .await?;
        let grace = chrono::Duration::from_std(self.grace).unwrap_or(chrono::Duration::MAX);
        let now = self.clock.now();

        let mut report = ReconcileReport::default();
        for record in candidates {
            report.examined += 1;
            let observed = record.file_state();
            let Some(key) = record.file_key().cloned() else {
                // キーなしの Pending/Failed は不整合。None に戻す
                Self::transition(lifecycle, &record, FileState::None).await?;
                continue;
            };

            if lifecycle.blobs.exists(&lifecycle.container, &key).await? {
                if Self::transition(lifecycle, &record, FileState::Attached).await? {
                    info!(record_id = %record.id(), %key, "object found, marked attached");
                    report.attached += 1;
                }
                continue;
            }

            match observed {
                FileState::Pending if now - record.created_at() >= grace => {
                    if Self::transition(lifecycle, &record, FileState::Failed).await? {
                        warn!(record_id = %record.id(), %key, "pending upload expired, marked failed");
                        report.failed += 1;
                    }
                }
                FileState::Pending => report.waiting += 1,
                _ => report.orphaned += 1,
            }
        }
        Ok(report)
    }

    /// Move the stored copy of `seen` to `to`, touching only its file state.
    ///
    /// 走査後に削除・更新されたレコードは書かない。戻り値は書いたかどうか。
    async fn transition<R: Record>(
        lifecycle: &RecordLifecycle<R>,
        seen: &R,
        to: FileState,
    ) -> Result<bool, CoordinatorError> {
        let id = seen.id();
        let Some(mut current) = lifecycle.store.get_by_id(id).await? else {
            debug!(record_id = %id, "record deleted during reconcile");
            return Ok(false);
        };
        if current.file_state() != seen.file_state() || current.file_key() != seen.file_key() {
            debug!(record_id = %id, "record changed during reconcile");
            return Ok(false);
        }

        current.set_file_state(to);
        match lifecycle.store.update(current).await {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound(_)) => {
                debug!(record_id = %id, "record deleted during reconcile");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run `reconcile_once` every `interval` until shutdown is requested.
    pub fn spawn(self, interval: Duration) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            self.run(interval, &mut shutdown_rx).await;
        });
        ReconcilerHandle { shutdown_tx, join }
    }

    pub async fn run(&self, interval: Duration, shutdown_rx: &mut watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // sender が消えたら止める
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.reconcile_once().await {
                warn!(error = %e, "reconcile pass failed");
            }
        }
        debug!("reconciler stopped");
    }
}

/// Handle to a spawned reconciler loop.
pub struct ReconcilerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}
