//! InMemoryMetadataStore - 開発用・テスト用のメタデータストア
//!
//! # 実装詳細
//! - HashMap<Id, R> を tokio の RwLock で保護
//! - 単一レコード単位で atomic（ロック 1 回で完結）
//! - ID は IdGenerator で採番（ULID）

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Id, Record};
use crate::ports::id_generator::generate;
use crate::ports::{IdGenerator, MetadataStore, Predicate, StoreError};

pub struct InMemoryMetadataStore<R: Record> {
    records: RwLock<HashMap<Id<R::Marker>, R>>,
    id_gen: Arc<dyn IdGenerator>,
}

impl<R: Record> InMemoryMetadataStore<R> {
    pub fn new(id_gen: Arc<dyn IdGenerator>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            id_gen,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl<R: Record> MetadataStore<R> for InMemoryMetadataStore<R> {
    async fn insert(&self, draft: R::Draft) -> Result<R, StoreError> {
        let id = generate::<R::Marker>(self.id_gen.as_ref());
        let record = R::from_draft(id, draft);
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(StoreError::OperationFailed(format!("duplicate id {id}")));
        }
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Id<R::Marker>) -> Result<Option<R>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>, StoreError> {
        let records = self.records.read().await;
        let mut found: Vec<R> = records.values().filter(|r| predicate(*r)).cloned().collect();
        // ULID 順 = 作成順
        found.sort_by_key(|r| r.id());
        Ok(found)
    }

    async fn update(&self, record: R) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id()) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(record.id().to_string())),
        }
    }

    async fn delete(&self, id: Id<R::Marker>) -> Result<(), StoreError> {
        self.records.write().await.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Assignment, AssignmentDraft, NewAssignment};
    use crate::ports::{SystemClock, UlidGenerator};
    use chrono::Utc;

    fn store() -> InMemoryMetadataStore<Assignment> {
        InMemoryMetadataStore::new(Arc::new(UlidGenerator::new(Arc::new(SystemClock))))
    }

    fn draft(course_id: &str) -> AssignmentDraft {
        AssignmentDraft::new(
            NewAssignment {
                issuer_id: "t1".to_string(),
                course_id: course_id.to_string(),
                description: "essay".to_string(),
                deadline_at: Utc::now(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_assigns_id_and_get_returns_it() {
        let store = store();
        let inserted = store.insert(draft("c1")).await.unwrap();
        let fetched = store.get_by_id(inserted.id).await.unwrap();
        assert_eq!(fetched, Some(inserted));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn find_by_filters_with_predicate() {
        let store = store();
        store.insert(draft("c1")).await.unwrap();
        store.insert(draft("c2")).await.unwrap();
        store.insert(draft("c1")).await.unwrap();

        let found = store.find_by(&|a: &Assignment| a.course_id == "c1").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|a| a.course_id == "c1"));
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store = store();
        let inserted = store.insert(draft("c1")).await.unwrap();
        let id = inserted.id;
        store.delete(id).await.unwrap();

        let err = store.update(inserted).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        // 二重 delete はエラーにならない
        store.delete(id).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn update_replaces_record() {
        let store = store();
        let mut inserted = store.insert(draft("c1")).await.unwrap();
        inserted.description = "revised".to_string();
        store.update(inserted.clone()).await.unwrap();
        let fetched = store.get_by_id(inserted.id).await.unwrap().unwrap();
        assert_eq!(fetched.description, "revised");
    }
}
