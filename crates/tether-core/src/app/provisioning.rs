//! Provisioner - コンテナと CORS の準備
//!
//! コンストラクタの副作用ではなく、起動時に明示的に呼ぶ。何度呼んでもよい。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::CoordinatorError;
use crate::ports::{CorsRule, ObjectStoreGateway};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// Containers that did not exist before this call.
    pub created: Vec<String>,
    pub cors_rules: usize,
}

pub struct Provisioner {
    blobs: Arc<dyn ObjectStoreGateway>,
    containers: Vec<String>,
    cors: Vec<CorsRule>,
}

impl Provisioner {
    pub fn new(
        blobs: Arc<dyn ObjectStoreGateway>,
        containers: Vec<String>,
        cors: Vec<CorsRule>,
    ) -> Self {
        Self {
            blobs,
            containers,
            cors,
        }
    }

    pub async fn provision(&self) -> Result<ProvisionReport, CoordinatorError> {
        let mut report = ProvisionReport::default();
        for container in &self.containers {
            let handle = self.blobs.ensure_container(container).await?;
            if handle.created {
                report.created.push(handle.name);
            }
        }
        if !self.cors.is_empty() {
            self.blobs.apply_cors(&self.cors).await?;
        }
        report.cors_rules = self.cors.len();

        info!(created = ?report.created, cors_rules = report.cors_rules, "object store provisioned");
        Ok(report)
    }
}
