//! Scoped access URLs and records enriched with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time-to-live for scoped URLs (20 minutes).
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(20 * 60);

/// Upper bound accepted for a scoped URL TTL (7 days, the S3 limit).
pub const MAX_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A time-bounded, credential-free, read-only URL for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl ScopedUrl {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Validate a requested TTL against `max`.
pub fn validate_ttl(ttl: Duration, max: Duration) -> Result<(), String> {
    if ttl.is_zero() {
        Err("ttl must be greater than zero".to_string())
    } else if ttl > max {
        Err(format!("ttl {:?} exceeds maximum allowed {:?}", ttl, max))
    } else {
        Ok(())
    }
}

/// Instant `ttl` after `now`. Fails instead of overflowing the timestamp range.
pub fn expires_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, String> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| format!("ttl {:?} overflows the expiry timestamp", ttl))
}

/// A record plus the access URL for its file, if one could be issued.
///
/// `access_url` is `None` both when the record has no file and when the file
/// key no longer resolves to an object (dangling reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enriched<R> {
    #[serde(flatten)]
    pub record: R,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_url: Option<ScopedUrl>,
}

impl<R> Enriched<R> {
    pub fn new(record: R, access_url: Option<ScopedUrl>) -> Self {
        Self { record, access_url }
    }

    pub fn has_access_url(&self) -> bool {
        self.access_url.is_some()
    }
}
