//! Conditional-insert allocation with bounded regeneration.

use crate::{AllocationError, AppId, ConditionalStore, IdGenerator, InsertOutcome, UuidV4Generator};
use std::sync::Arc;

/// Persists one [`AppId`] with an all-or-nothing guarantee against duplicates.
///
/// Each attempt is a single atomic insert-if-absent on the store. When the ID
/// is taken:
///
/// - a generated record with budget left gets a fresh ID and tries again;
/// - anything else (caller-supplied ID, exhausted budget) ends with
///   [`AllocationError::DuplicateId`].
///
/// Store failures end the allocation immediately as
/// [`AllocationError::Store`] without touching the budget. Uniqueness is
/// entirely the store's responsibility; the allocator keeps no record of IDs
/// it has handed out.
#[derive(Debug)]
pub struct Allocator<S, G = UuidV4Generator> {
    store: Arc<S>,
    generator: G,
}

impl<S, G> Allocator<S, G>
where
    S: ConditionalStore,
    G: IdGenerator,
{
    pub const fn new(store: Arc<S>, generator: G) -> Self {
        Self { store, generator }
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn generator(&self) -> &G {
        &self.generator
    }

    /// Allocates `record`, regenerating its ID at most `retries` times.
    ///
    /// A budget of 0 means exactly one attempt. Caller-supplied IDs always get
    /// a budget of 0: replacing a value the caller chose would silently change
    /// what they asked for.
    #[tracing::instrument(level = "trace", skip_all, fields(id = %record.id(), generated = record.is_generated()))]
    pub async fn allocate(&self, record: AppId, retries: u32) -> Result<AppId, AllocationError> {
        let mut remaining = if record.is_generated() { retries } else { 0 };
        let mut candidate = record;

        loop {
            tracing::trace!(id = %candidate.id(), remaining, "Inserting App ID");

            match self.store.insert_if_absent(&candidate).await {
                Ok(InsertOutcome::Applied) => return Ok(candidate.into_applied()),
                Ok(InsertOutcome::AlreadyExists) if remaining > 0 => {
                    let next = candidate.with_id(self.generator.next_id());
                    tracing::debug!(
                        "Generated App ID \"{}\" already exists, regenerating as \"{}\" ({} retries left)",
                        candidate.id(),
                        next.id(),
                        remaining - 1
                    );
                    remaining -= 1;
                    candidate = next;
                }
                Ok(InsertOutcome::AlreadyExists) => {
                    tracing::debug!("App ID \"{}\" already exists", candidate.id());
                    return Err(AllocationError::DuplicateId { record: candidate });
                }
                Err(source) => {
                    tracing::warn!("Failed to insert App ID \"{}\": {source}", candidate.id());
                    return Err(AllocationError::Store {
                        record: candidate,
                        source,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingStore, FailingStore};
    use crate::{MemoryStore, SequentialGenerator, StoreError};
    use std::collections::HashSet;

    fn allocator(store: &Arc<CountingStore<MemoryStore>>) -> Allocator<CountingStore<MemoryStore>, SequentialGenerator> {
        Allocator::new(Arc::clone(store), SequentialGenerator::new("gen"))
    }

    async fn seed(store: &CountingStore<MemoryStore>, ids: &[&str]) {
        for id in ids {
            store
                .inner()
                .insert_if_absent(&AppId::register(*id, "seed"))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn free_id_is_applied_on_first_attempt() {
        let store = Arc::new(CountingStore::new(MemoryStore::new()));
        let stored = allocator(&store)
            .allocate(AppId::register("a", "u1"), 3)
            .await
            .unwrap();

        assert!(stored.is_applied());
        assert_eq!(stored.id(), "a");
        assert_eq!(store.attempted(), vec!["a".to_owned()]);
    }

    #[tokio::test]
    async fn caller_supplied_conflict_is_never_retried() {
        let store = Arc::new(CountingStore::new(MemoryStore::new()));
        seed(&store, &["a"]).await;

        let err = allocator(&store)
            .allocate(AppId::register("a", "u1"), 10)
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(err.id(), "a");
        assert_eq!(store.attempted().len(), 1);
    }

    #[tokio::test]
    async fn generated_conflict_regenerates() {
        let store = Arc::new(CountingStore::new(MemoryStore::new()));
        seed(&store, &["taken", "gen-1"]).await;

        let stored = allocator(&store)
            .allocate(AppId::new("taken", "u1", true), 3)
            .await
            .unwrap();

        assert_eq!(stored.id(), "gen-2");
        assert_eq!(stored.created_by(), "u1");
        assert!(stored.is_generated());
        assert_eq!(store.attempted(), vec!["taken", "gen-1", "gen-2"]);
    }

    #[tokio::test]
    async fn retry_budget_bounds_distinct_attempts() {
        for budget in 0..4_u32 {
            let store = Arc::new(CountingStore::new(MemoryStore::new()));
            seed(&store, &["taken", "gen-1", "gen-2", "gen-3", "gen-4"]).await;

            let err = allocator(&store)
                .allocate(AppId::new("taken", "u1", true), budget)
                .await
                .unwrap_err();

            let attempted = store.attempted();
            let distinct: HashSet<_> = attempted.iter().collect();
            assert!(err.is_conflict());
            assert_eq!(attempted.len(), budget as usize + 1);
            assert_eq!(distinct.len(), attempted.len());
            assert_eq!(err.id(), attempted[attempted.len() - 1]);
        }
    }

    #[tokio::test]
    async fn store_error_is_not_a_conflict_and_is_not_retried() {
        let store = Arc::new(FailingStore::new(StoreError::Unavailable {
            context: "connection reset".into(),
        }));
        let allocator = Allocator::new(Arc::clone(&store), SequentialGenerator::new("gen"));

        let err = allocator
            .allocate(AppId::new("x", "u1", true), 5)
            .await
            .unwrap_err();

        assert!(!err.is_conflict());
        assert!(matches!(
            err,
            AllocationError::Store {
                source: StoreError::Unavailable { .. },
                ..
            }
        ));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_colliding_allocations_store_each_id_once() {
        let store = Arc::new(MemoryStore::new());
        let generator = SequentialGenerator::new("gen");
        let mut tasks = Vec::new();

        // Several allocators share one store and one generator, and all start
        // from the same handful of IDs.
        for i in 0..32 {
            let allocator = Allocator::new(Arc::clone(&store), generator.clone());
            tasks.push(tokio::spawn(async move {
                allocator
                    .allocate(AppId::new(format!("seed-{}", i % 4), "u1", true), 64)
                    .await
            }));
        }

        let mut stored = HashSet::new();
        for task in tasks {
            let record = task.await.unwrap().unwrap();
            assert!(stored.insert(record.id().to_owned()), "duplicate {}", record.id());
        }
        assert_eq!(stored.len(), 32);
        assert_eq!(store.len(), 32);
    }
}
