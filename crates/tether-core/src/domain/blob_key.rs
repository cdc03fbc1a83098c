//! Blob key derivation and tagging policy.
//!
//! キーは `<partition>/<uuid v4>.<ext>` の形式。ランダム部分があるので
//! 同じ所有者が再アップロードしても衝突しない。同じ partition のファイルは
//! 共通プレフィックスの下にまとまる。

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Object key inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobKey(String);

impl BlobKey {
    /// Derive a fresh key for `original_file_name` under `partition`.
    ///
    /// Only the extension of the original name is kept; a name without one
    /// yields a key without a dot suffix.
    pub fn derive(partition: &Partition, original_file_name: &str) -> Self {
        Self::derive_with(partition, original_file_name, Uuid::new_v4())
    }

    fn derive_with(partition: &Partition, original_file_name: &str, nonce: Uuid) -> Self {
        let extension = Path::new(original_file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty());

        match extension {
            Some(ext) => Self(format!("{}/{}.{}", partition.as_str(), nonce, ext)),
            None => Self(format!("{}/{}", partition.as_str(), nonce)),
        }
    }

    /// Wrap a key that already exists in a store (e.g. listed or persisted).
    pub fn from_existing(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Partition prefix of this key (everything before the last `/`).
    pub fn partition_prefix(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(prefix, _)| prefix)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical grouping prefix for blob keys.
///
/// - Assignment files: `<courseId>`
/// - Submission files: `<assignmentId>/<responderId>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition(String);

impl Partition {
    pub fn course(course_id: &str) -> Self {
        Self(sanitize_segment(course_id))
    }

    pub fn submission(assignment_id: &str, responder_id: &str) -> Self {
        Self(format!(
            "{}/{}",
            sanitize_segment(assignment_id),
            sanitize_segment(responder_id)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// 区切り文字が ID に混ざるとプレフィックスの意味が崩れるので置換する。
// 空や `.` / `..` はパスとして解釈できないので `_` にする
fn sanitize_segment(raw: &str) -> String {
    match raw.trim() {
        "" | "." | ".." => "_".to_string(),
        _ => raw.replace('/', "_"),
    }
}

/// Tags written next to every uploaded blob.
///
/// Mirrors fields of the owning record so the object store can be audited
/// or swept by itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobTags(BTreeMap<String, String>);

impl BlobTags {
    pub const USER_ID: &'static str = "userid";
    pub const COURSE_ID: &'static str = "courseid";
    pub const ASSIGNMENT_ID: &'static str = "assignmentid";
    pub const SUBMISSION_ID: &'static str = "submissionid";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// File payload handed over by the inbound layer.
///
/// The original name is used only to pick the extension of the derived key.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content: Bytes,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// A zero-length upload counts as "no file".
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case("report.pdf", Some("pdf"))]
    #[case("archive.tar.gz", Some("gz"))]
    #[case("README", None)]
    #[case("dir/notes.TXT", Some("TXT"))]
    #[case(".hidden", None)]
    fn derive_keeps_only_the_extension(#[case] name: &str, #[case] ext: Option<&str>) {
        let nonce = Uuid::new_v4();
        let key = BlobKey::derive_with(&Partition::course("c1"), name, nonce);
        let expected = match ext {
            Some(ext) => format!("c1/{nonce}.{ext}"),
            None => format!("c1/{nonce}"),
        };
        assert_eq!(key.as_str(), expected);
    }

    #[test]
    fn derived_keys_do_not_collide_within_a_partition() {
        let partition = Partition::course("c1");
        let keys: HashSet<BlobKey> = (0..10_000)
            .map(|_| BlobKey::derive(&partition, "report.pdf"))
            .collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn submission_partition_nests_responder_under_assignment() {
        let partition = Partition::submission("asg-1", "student/7");
        assert_eq!(partition.as_str(), "asg-1/student_7");

        let key = BlobKey::derive(&partition, "main.rs");
        assert!(key.as_str().starts_with("asg-1/student_7/"));
        assert_eq!(key.partition_prefix(), Some("asg-1/student_7"));
    }

    #[rstest]
    #[case("", "_")]
    #[case("  ", "_")]
    #[case("..", "_")]
    #[case(".", "_")]
    #[case("c/1", "c_1")]
    fn degenerate_segments_still_form_a_relative_key(#[case] course: &str, #[case] expected: &str) {
        let partition = Partition::course(course);
        assert_eq!(partition.as_str(), expected);

        let key = BlobKey::derive(&partition, "a.pdf");
        assert!(!key.as_str().starts_with('/'));
        assert_eq!(key.partition_prefix(), Some(expected));
    }

    #[test]
    fn tags_are_ordered_and_queryable() {
        let tags = BlobTags::new()
            .with(BlobTags::USER_ID, "u1")
            .with(BlobTags::COURSE_ID, "c1");
        assert_eq!(tags.get(BlobTags::COURSE_ID), Some("c1"));
        assert_eq!(tags.len(), 2);
        let names: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["courseid", "userid"]);
    }

    #[test]
    fn empty_upload_is_no_file() {
        assert!(FileUpload::new("a.pdf", Vec::<u8>::new()).is_empty());
        assert!(!FileUpload::new("a.pdf", vec![1u8]).is_empty());
    }
}
