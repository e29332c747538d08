//! Conditional store abstraction and backends.
//!
//! The allocator relies on a single property of the backend: an atomic
//! insert-if-absent keyed by App ID. The store never performs a separate
//! existence check before writing, and never retries a failed operation.
//!
//! ## Backends
//!
//! - [`MemoryStore`] - process-local map, for tests and single-process runs.
//! - [`SqliteStore`] - SQLite file using `INSERT ... ON CONFLICT DO NOTHING`.
//!
//! Table provisioning lives in [`Provision`] and is run by the process
//! bootstrap before any insert is attempted.

mod backoff;
mod memory;
mod sqlite;

pub use backoff::FibonacciBackoff;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::{AppId, StoreError};
use core::future::Future;

/// Name of the single table holding App IDs.
pub const TABLE_NAME: &str = "appids";

/// Result of a conditional insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written.
    Applied,
    /// A row with the same ID already exists; nothing was written.
    AlreadyExists,
}

/// Storage backend exposing an atomic insert-if-absent.
///
/// Implementations are shared process-wide behind an `Arc` and must be safe to
/// call concurrently.
pub trait ConditionalStore: Send + Sync + 'static {
    /// Writes `record` only if no row with the same ID exists, as one atomic
    /// operation.
    fn insert_if_absent(
        &self,
        record: &AppId,
    ) -> impl Future<Output = Result<InsertOutcome, StoreError>> + Send;

    /// Best-effort existence probe. Informational only, never used to decide
    /// whether an insert is safe.
    fn exists(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Table lifecycle operations used at startup and by tests.
pub trait Provision: Send + Sync {
    /// Creates the table if it does not exist.
    fn create_table(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn drop_table(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes every row, keeping the table.
    fn truncate(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
