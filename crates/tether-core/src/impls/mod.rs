//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryMetadataStore**: 開発用・テスト用の正本
//! - **InMemoryObjectStore**: 開発用・テスト用の Blob ストア
//! - **LocalObjectStore**: ファイルシステム上の Blob ストア
//! - **UrlSigner**: 上記 2 つが共有する scoped URL の署名
//!
//! # 本番用実装
//! クラウドのストア（S3 / Azure Blob / MongoDB など）は別クレートで
//! 同じ trait を実装する。

pub mod inmem_metadata;
pub mod inmem_object;
pub mod local_object;
pub mod signing;

pub use self::inmem_metadata::InMemoryMetadataStore;
pub use self::inmem_object::InMemoryObjectStore;
pub use self::local_object::LocalObjectStore;
pub use self::signing::{SignedTarget, UrlSigner, VerifyError};

use crate::ports::BlobError;

/// Container names follow the common S3 / Azure rules:
/// 3-63 chars of lowercase letters, digits and '-', starting and ending
/// with a letter or digit.
pub(crate) fn validate_container_name(name: &str) -> Result<(), BlobError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if (3..=63).contains(&name.len()) && valid_chars && valid_edges {
        Ok(())
    } else {
        Err(BlobError::InvalidContainer(name.to_string()))
    }
}
