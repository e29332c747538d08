//! Batch coordination across the allocator.
//!
//! A batch is an ordered list of candidate records. Every record goes through
//! [`Allocator::allocate`] exactly once, and its outcome never affects its
//! siblings. The coordinator waits for every item to finish and returns two
//! collections, both in input order.

use crate::{AllocationError, AppId, Allocator, ConditionalStore, IdGenerator, UuidV4Generator};
use core::num::NonZeroUsize;
use futures::{StreamExt, stream};

/// A per-item failure, tagged with the item's position in the input.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemError {
    pub index: usize,
    pub error: AllocationError,
}

/// Outcome of a whole batch.
///
/// All items failing is still a completed batch. Whether the request as a
/// whole failed is decided by the caller from [`BatchOutcome::is_failed`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOutcome {
    pub errors: Vec<ItemError>,
    pub successes: Vec<AppId>,
}

impl BatchOutcome {
    /// True when at least one item failed, even if others succeeded.
    pub fn is_failed(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn conflicts(&self) -> usize {
        self.errors.iter().filter(|e| e.error.is_conflict()).count()
    }
}

/// Drives a batch through an [`Allocator`] with bounded concurrency.
///
/// The default concurrency is 1: item *i* is inserted only after item *i-1*
/// reached its final outcome, which keeps contention on the shared store low
/// while retries are in flight. Higher values overlap store round-trips but
/// keep both the per-item independence and the input ordering of the output.
#[derive(Debug)]
pub struct BatchCoordinator<S, G = UuidV4Generator> {
    allocator: Allocator<S, G>,
    concurrency: NonZeroUsize,
}

impl<S, G> BatchCoordinator<S, G>
where
    S: ConditionalStore,
    G: IdGenerator,
{
    pub const fn new(allocator: Allocator<S, G>, concurrency: NonZeroUsize) -> Self {
        Self {
            allocator,
            concurrency,
        }
    }

    /// A coordinator that processes one item at a time.
    pub const fn sequential(allocator: Allocator<S, G>) -> Self {
        Self::new(allocator, NonZeroUsize::MIN)
    }

    pub const fn allocator(&self) -> &Allocator<S, G> {
        &self.allocator
    }

    /// Allocates every record, collecting successes and failures separately.
    ///
    /// An empty batch returns immediately without touching the store.
    #[tracing::instrument(level = "debug", skip_all, fields(items = records.len(), retries = retries))]
    pub async fn allocate_all(&self, records: Vec<AppId>, retries: u32) -> BatchOutcome {
        if records.is_empty() {
            return BatchOutcome::default();
        }

        let allocator = &self.allocator;
        let results: Vec<(usize, Result<AppId, AllocationError>)> =
            stream::iter(records.into_iter().enumerate())
                .map(move |(index, record)| async move {
                    (index, allocator.allocate(record, retries).await)
                })
                .buffered(self.concurrency.get())
                .collect()
                .await;

        let mut outcome = BatchOutcome::default();
        for (index, result) in results {
            match result {
                Ok(record) => outcome.successes.push(record),
                Err(error) => outcome.errors.push(ItemError { index, error }),
            }
        }

        tracing::debug!(
            "Batch finished with {} stored and {} failed",
            outcome.successes.len(),
            outcome.errors.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingStore, FailingStore};
    use crate::{MemoryStore, SequentialGenerator, StoreError};
    use std::sync::Arc;

    fn coordinator<S: ConditionalStore>(
        store: &Arc<S>,
        concurrency: usize,
    ) -> BatchCoordinator<S, SequentialGenerator> {
        BatchCoordinator::new(
            Allocator::new(Arc::clone(store), SequentialGenerator::new("gen")),
            NonZeroUsize::new(concurrency).unwrap(),
        )
    }

    fn registered(ids: &[&str]) -> Vec<AppId> {
        ids.iter().map(|id| AppId::register(*id, "u1")).collect()
    }

    #[tokio::test]
    async fn empty_batch_makes_no_store_calls() {
        let store = Arc::new(CountingStore::new(MemoryStore::new()));
        let outcome = coordinator(&store, 1).allocate_all(Vec::new(), 3).await;
        assert_eq!(outcome, BatchOutcome::default());
        assert!(store.attempted().is_empty());
    }

    #[tokio::test]
    async fn one_conflict_does_not_affect_siblings() {
        for concurrency in [1, 3] {
            let store = Arc::new(CountingStore::new(MemoryStore::new()));
            store
                .inner()
                .insert_if_absent(&AppId::register("b", "other"))
                .await
                .unwrap();

            let outcome = coordinator(&store, concurrency)
                .allocate_all(registered(&["a", "b", "c"]), 3)
                .await;

            let ids: Vec<_> = outcome.successes.iter().map(AppId::id).collect();
            assert_eq!(ids, ["a", "c"]);
            assert_eq!(outcome.errors.len(), 1);
            assert_eq!(outcome.errors[0].index, 1);
            assert_eq!(outcome.errors[0].error.id(), "b");
            assert!(outcome.is_failed());
            assert_eq!(outcome.conflicts(), 1);
            assert_eq!(store.attempted().len(), 3);
        }
    }

    #[tokio::test]
    async fn sequential_batches_attempt_in_input_order() {
        let store = Arc::new(CountingStore::new(MemoryStore::new()));
        let outcome = coordinator(&store, 1)
            .allocate_all(registered(&["c", "a", "b"]), 0)
            .await;
        assert!(!outcome.is_failed());
        assert_eq!(store.attempted(), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn store_errors_are_isolated_per_item() {
        let store = Arc::new(FailingStore::for_ids(
            StoreError::Timeout {
                operation: "insert_if_absent",
                timeout_ms: 10,
            },
            &["b"],
        ));

        let outcome = coordinator(&store, 1)
            .allocate_all(registered(&["a", "b", "c"]), 3)
            .await;

        assert_eq!(outcome.successes.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.conflicts(), 0);
        assert!(matches!(
            outcome.errors[0].error,
            AllocationError::Store { .. }
        ));
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn all_failed_batch_still_completes() {
        let store = Arc::new(CountingStore::new(MemoryStore::new()));
        for id in ["a", "b"] {
            store
                .inner()
                .insert_if_absent(&AppId::register(id, "other"))
                .await
                .unwrap();
        }

        let outcome = coordinator(&store, 1)
            .allocate_all(registered(&["a", "b"]), 3)
            .await;

        assert!(outcome.successes.is_empty());
        let indexes: Vec<_> = outcome.errors.iter().map(|e| e.index).collect();
        assert_eq!(indexes, [0, 1]);
    }
}
