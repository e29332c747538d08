//! Store wrappers used by the unit tests.

use crate::{AppId, ConditionalStore, InsertOutcome, StoreError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records every ID passed to `insert_if_absent` before delegating.
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    attempted: Mutex<Vec<String>>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            attempted: Mutex::new(Vec::new()),
        }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }

    pub fn attempted(&self) -> Vec<String> {
        self.attempted.lock().clone()
    }
}

impl<S: ConditionalStore> ConditionalStore for CountingStore<S> {
    async fn insert_if_absent(&self, record: &AppId) -> Result<InsertOutcome, StoreError> {
        self.attempted.lock().push(record.id().to_owned());
        self.inner.insert_if_absent(record).await
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.exists(id).await
    }
}

/// Fails every insert whose ID is in `failing` (or every insert when
/// `failing` is empty) with a fixed error. Other inserts always apply.
#[derive(Debug)]
pub struct FailingStore {
    error: StoreError,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn new(error: StoreError) -> Self {
        Self {
            error,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn for_ids(error: StoreError, ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| (*id).to_owned()).collect(),
            ..Self::new(error)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ConditionalStore for FailingStore {
    async fn insert_if_absent(&self, record: &AppId) -> Result<InsertOutcome, StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.is_empty() || self.failing.contains(record.id()) {
            Err(self.error.clone())
        } else {
            Ok(InsertOutcome::Applied)
        }
    }

    async fn exists(&self, _id: &str) -> Result<bool, StoreError> {
        Err(self.error.clone())
    }
}
