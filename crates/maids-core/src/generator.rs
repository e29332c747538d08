//! Sources of new App ID values.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces candidate ID values for system-generated records.
///
/// Implementations must make a repeat of any earlier value negligibly likely
/// over the lifetime of the table. Uniqueness itself is enforced by the store.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random 128-bit UUIDv4 rendered in canonical hyphenated form.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` IDs. Clones share the counter.
#[derive(Clone, Debug)]
pub struct SequentialGenerator {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl IdGenerator for SequentialGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}
