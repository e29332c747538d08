use super::{ConditionalStore, InsertOutcome, Provision};
use crate::{AppId, StoreError};
use core::future::{Future, ready};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Process-local store backed by a mutex-guarded map.
///
/// Insert-if-absent runs inside one critical section, so it is atomic for all
/// callers sharing this instance. It offers no guarantee across processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, AppId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored row for `id`.
    pub fn get(&self, id: &str) -> Option<AppId> {
        self.rows.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    fn insert_row(&self, record: &AppId) -> InsertOutcome {
        match self.rows.lock().entry(record.id().to_owned()) {
            Entry::Occupied(_) => InsertOutcome::AlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                InsertOutcome::Applied
            }
        }
    }
}

impl ConditionalStore for MemoryStore {
    fn insert_if_absent(
        &self,
        record: &AppId,
    ) -> impl Future<Output = Result<InsertOutcome, StoreError>> + Send {
        ready(Ok(self.insert_row(record)))
    }

    fn exists(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send {
        ready(Ok(self.rows.lock().contains_key(id)))
    }
}

impl Provision for MemoryStore {
    fn create_table(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(Ok(()))
    }

    fn drop_table(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.rows.lock().clear();
        ready(Ok(()))
    }

    fn truncate(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.rows.lock().clear();
        ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_insert_of_same_id_is_rejected() {
        let store = MemoryStore::new();
        let first = AppId::register("a", "u1");
        let second = AppId::register("a", "u2");

        assert_eq!(
            store.insert_if_absent(&first).await,
            Ok(InsertOutcome::Applied)
        );
        assert_eq!(
            store.insert_if_absent(&second).await,
            Ok(InsertOutcome::AlreadyExists)
        );
        assert_eq!(store.get("a").map(|r| r.created_by().to_owned()), Some("u1".into()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.exists("a").await, Ok(true));
        assert_eq!(store.exists("b").await, Ok(false));
    }

    #[tokio::test]
    async fn truncate_clears_rows() {
        let store = MemoryStore::new();
        store.create_table().await.unwrap();
        store
            .insert_if_absent(&AppId::register("a", "u1"))
            .await
            .unwrap();
        store.truncate().await.unwrap();
        assert!(store.is_empty());
    }
}
