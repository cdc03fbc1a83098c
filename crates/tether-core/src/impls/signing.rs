//! UrlSigner - HMAC-SHA256 で署名した読み取り専用 URL
//!
//! 形式: `<base>/<container>/<key>?sp=r&se=<unix秒>&sig=<hex>`
//! 署名対象は `container \n key \n se \n sp`。
//! 実サービス（S3 presign, Azure SAS）と同じく、URL 単体で認可が完結する。

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use sha2::Sha256;
use thiserror::Error;
use url::Url;

use crate::domain::{BlobKey, ScopedUrl};
use crate::ports::BlobError;

type HmacSha256 = Hmac<Sha256>;

const READ_PERMISSION: &str = "r";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed scoped url: {0}")]
    Malformed(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("scoped url expired at {0}")]
    Expired(DateTime<Utc>),
}

/// Object addressed by a verified scoped URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTarget {
    pub container: String,
    pub key: BlobKey,
}

#[derive(Clone)]
pub struct UrlSigner {
    base_url: Url,
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(base_url: &str, secret: impl AsRef<[u8]>) -> Result<Self, BlobError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BlobError::Signing(format!("invalid base url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BlobError::Signing(format!(
                "base url '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            base_url,
            secret: secret.as_ref().to_vec(),
        })
    }

    pub fn sign(
        &self,
        container: &str,
        key: &BlobKey,
        expires_at: DateTime<Utc>,
    ) -> Result<ScopedUrl, BlobError> {
        let expiry = expires_at.timestamp();
        let signature = self.signature(container, key.as_str(), expiry)?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BlobError::Signing("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(container)
            .extend(key.as_str().split('/'));
        url.query_pairs_mut()
            .append_pair("sp", READ_PERMISSION)
            .append_pair("se", &expiry.to_string())
            .append_pair("sig", &signature);

        let expires_at = Utc
            .timestamp_opt(expiry, 0)
            .single()
            .ok_or_else(|| BlobError::Signing(format!("expiry {expiry} out of range")))?;

        Ok(ScopedUrl {
            url: url.into(),
            expires_at,
        })
    }

    /// Check signature and expiry of a URL produced by [`UrlSigner::sign`].
    pub fn verify(&self, scoped_url: &str, now: DateTime<Utc>) -> Result<SignedTarget, VerifyError> {
        let url = Url::parse(scoped_url).map_err(|e| VerifyError::Malformed(e.to_string()))?;

        let base_depth = segments(&self.base_url).len();
        let mut parts = segments(&url)
            .into_iter()
            .skip(base_depth)
            .map(|seg| {
                percent_decode_str(&seg)
                    .decode_utf8()
                    .map(|s| s.into_owned())
                    .map_err(|e| VerifyError::Malformed(e.to_string()))
            })
            .collect::<Result<Vec<String>, VerifyError>>()?;
        if parts.len() < 2 {
            return Err(VerifyError::Malformed("missing container or key".to_string()));
        }
        let container = parts.remove(0);
        let key = parts.join("/");

        let mut permission = None;
        let mut expiry = None;
        let mut signature = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "sp" => permission = Some(value.into_owned()),
                "se" => expiry = value.parse::<i64>().ok(),
                "sig" => signature = Some(value.into_owned()),
                _ => {}
            }
        }
        let (Some(permission), Some(expiry), Some(signature)) = (permission, expiry, signature)
        else {
            return Err(VerifyError::Malformed("missing query parameters".to_string()));
        };
        if permission != READ_PERMISSION {
            return Err(VerifyError::BadSignature);
        }

        let raw_signature = hex::decode(&signature).map_err(|_| VerifyError::BadSignature)?;
        let mut mac = self.mac().ok_or(VerifyError::BadSignature)?;
        mac.update(payload(&container, &key, expiry).as_bytes());
        mac.verify_slice(&raw_signature)
            .map_err(|_| VerifyError::BadSignature)?;

        let expires_at = Utc
            .timestamp_opt(expiry, 0)
            .single()
            .ok_or_else(|| VerifyError::Malformed(format!("expiry {expiry} out of range")))?;
        if now >= expires_at {
            return Err(VerifyError::Expired(expires_at));
        }

        Ok(SignedTarget {
            container,
            key: BlobKey::from_existing(key),
        })
    }

    fn signature(&self, container: &str, key: &str, expiry: i64) -> Result<String, BlobError> {
        let mut mac = self
            .mac()
            .ok_or_else(|| BlobError::Signing("unusable signing secret".to_string()))?;
        mac.update(payload(container, key, expiry).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).ok()
    }
}

fn payload(container: &str, key: &str, expiry: i64) -> String {
    format!("{container}\n{key}\n{expiry}\n{READ_PERMISSION}")
}

fn segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}
