//! TetherConfig - デプロイ時の設定
//!
//! コンテナ名・URL の TTL・署名鍵などはデータモデルではなく設定。
//!
//! # 読み込み
//! - `from_env()`: `.env` があれば読み（dotenvy）、`TETHER_*` 環境変数で上書き
//! - `from_json()`: JSON ドキュメント（欠けた項目はデフォルト）

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::access::validate_ttl;
use crate::domain::{DEFAULT_URL_TTL, MAX_URL_TTL};
use crate::ports::CorsRule;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Container holding files attached to assignments.
    pub assignment_container: String,

    /// Container holding files attached to submissions.
    pub submission_container: String,

    pub default_url_ttl_secs: u64,

    pub max_url_ttl_secs: u64,

    /// HMAC key for scoped URLs issued by the in-process gateways.
    pub signing_secret: String,

    pub public_base_url: String,

    /// Allow Accepted / Rejected submissions to go back to UnderReview.
    pub allow_re_review: bool,

    /// Pending uploads older than this are marked failed by the reconciler.
    pub reconcile_grace_secs: u64,

    pub cors: Vec<CorsRule>,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            assignment_container: "created-assignments".to_string(),
            submission_container: "uploaded-assignments".to_string(),
            default_url_ttl_secs: DEFAULT_URL_TTL.as_secs(),
            max_url_ttl_secs: MAX_URL_TTL.as_secs(),
            signing_secret: String::new(),
            public_base_url: "http://127.0.0.1:10000/".to_string(),
            allow_re_review: false,
            reconcile_grace_secs: 15 * 60,
            cors: vec![CorsRule::default()],
        }
    }
}

impl TetherConfig {
    /// Load from `TETHER_*` environment variables (after an optional `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("TETHER_ASSIGNMENT_CONTAINER") {
            config.assignment_container = v;
        }
        if let Some(v) = lookup("TETHER_SUBMISSION_CONTAINER") {
            config.submission_container = v;
        }
        if let Some(v) = lookup("TETHER_DEFAULT_URL_TTL_SECS") {
            config.default_url_ttl_secs = parse_number("TETHER_DEFAULT_URL_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("TETHER_MAX_URL_TTL_SECS") {
            config.max_url_ttl_secs = parse_number("TETHER_MAX_URL_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("TETHER_RECONCILE_GRACE_SECS") {
            config.reconcile_grace_secs = parse_number("TETHER_RECONCILE_GRACE_SECS", &v)?;
        }
        if let Some(v) = lookup("TETHER_PUBLIC_BASE_URL") {
            config.public_base_url = v;
        }
        if let Some(v) = lookup("TETHER_ALLOW_RE_REVIEW") {
            config.allow_re_review = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        config.signing_secret =
            lookup("TETHER_SIGNING_SECRET").ok_or(ConfigError::Missing("TETHER_SIGNING_SECRET"))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.is_empty() {
            return Err(ConfigError::Missing("signing_secret"));
        }
        if self.assignment_container == self.submission_container {
            return Err(ConfigError::Invalid {
                name: "submission_container",
                reason: "must differ from assignment_container".to_string(),
            });
        }
        validate_ttl(self.max_url_ttl(), MAX_URL_TTL).map_err(|reason| ConfigError::Invalid {
            name: "max_url_ttl_secs",
            reason,
        })?;
        validate_ttl(self.default_url_ttl(), self.max_url_ttl()).map_err(|reason| {
            ConfigError::Invalid {
                name: "default_url_ttl_secs",
                reason,
            }
        })
    }

    pub fn default_url_ttl(&self) -> Duration {
        Duration::from_secs(self.default_url_ttl_secs)
    }

    pub fn max_url_ttl(&self) -> Duration {
        Duration::from_secs(self.max_url_ttl_secs)
    }

    pub fn reconcile_grace(&self) -> Duration {
        Duration::from_secs(self.reconcile_grace_secs)
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
