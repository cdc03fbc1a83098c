//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! メタデータストアが insert 時に採番する ID は ULID です。
//! Phantom type パターンで `AssignmentId` と `SubmissionId` を
//! コンパイル時に区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 作成順に並ぶ
//! - **分散生成可能**: 調整なしで複数ノードで生成できる
//! - **UUID互換**: 128-bit

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display / FromStr で使うプレフィックス（"asg-", "sub-"）を提供します。
pub trait IdMarker:
    fmt::Debug + Clone + Copy + PartialEq + Eq + std::hash::Hash + PartialOrd + Ord + Send + Sync + 'static
{
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
///
/// # 例
/// ```ignore
/// let assignment_id: AssignmentId = Id::from(Ulid::new());
/// let submission_id: SubmissionId = Id::from(Ulid::new());
/// // 異なる型なので混同できない
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Id のパースエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("expected prefix '{expected}' in '{input}'")]
    MissingPrefix { expected: &'static str, input: String },

    #[error("invalid ulid in '{0}'")]
    InvalidUlid(String),
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    /// `Display` の逆変換。プレフィックスなしの生 ULID も受け付ける。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = match s.strip_prefix(T::prefix()) {
            Some(rest) => rest,
            None if !s.contains('-') => s,
            None => {
                return Err(ParseIdError::MissingPrefix {
                    expected: T::prefix(),
                    input: s.to_string(),
                });
            }
        };
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError::InvalidUlid(s.to_string()))
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Assignment のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssignmentKind {}

impl IdMarker for AssignmentKind {
    fn prefix() -> &'static str {
        "asg-"
    }
}

/// Submission のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubmissionKind {}

impl IdMarker for SubmissionKind {
    fn prefix() -> &'static str {
        "sub-"
    }
}

/// Identifier of an Assignment (issued by the metadata store on insert).
pub type AssignmentId = Id<AssignmentKind>;

/// Identifier of a Submission (issued by the metadata store on insert).
pub type SubmissionId = Id<SubmissionKind>;
