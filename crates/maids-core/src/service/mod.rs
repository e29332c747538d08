//! Request handling for the register and create operations.
//!
//! [`AppIdService`] validates a request, turns it into candidate records and
//! hands them to the [`BatchCoordinator`]. Validation failures are returned
//! before the store is touched. Once a batch starts, per-item failures are
//! part of the [`BatchOutcome`] rather than an `Err`.

mod request;


pub use request::{CreateRequest, RegisterRequest};

use crate::{
    AllocationConfig, Allocator, AppId, BatchCoordinator, BatchOutcome, ConditionalStore,
    IdGenerator, StoreError, UuidV4Generator, ValidationError,
};
use core::num::NonZeroUsize;
use request::{coerce_ids, parse_count, parse_retries};
use serde_json::Value;
use std::sync::Arc;

/// The authenticated identity a request acts on behalf of.
///
/// Stored as the `created_by` of every record the request produces.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Caller {
    pub id: String,
}

impl Caller {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug)]
pub struct AppIdService<S, G = UuidV4Generator> {
    coordinator: BatchCoordinator<S, G>,
    config: AllocationConfig,
}

impl<S, G> AppIdService<S, G>
where
    S: ConditionalStore,
    G: IdGenerator,
{
    /// Builds the service. A `batch_concurrency` of 0 is treated as 1.
    pub fn new(store: Arc<S>, generator: G, config: AllocationConfig) -> Self {
        let concurrency = NonZeroUsize::new(config.batch_concurrency).unwrap_or(NonZeroUsize::MIN);
        Self {
            coordinator: BatchCoordinator::new(Allocator::new(store, generator), concurrency),
            config,
        }
    }

    pub const fn config(&self) -> &AllocationConfig {
        &self.config
    }

    pub const fn store(&self) -> &Arc<S> {
        self.coordinator.allocator().store()
    }

    /// Registers caller-chosen IDs.
    ///
    /// Each ID is stored as-is with `is_generated = false`, so a taken ID is
    /// reported as a conflict and never replaced.
    #[tracing::instrument(level = "debug", skip_all, fields(caller = %caller.id))]
    pub async fn register(
        &self,
        caller: &Caller,
        request: RegisterRequest,
    ) -> Result<BatchOutcome, ValidationError> {
        let ids = match request.ids {
            Some(Value::Array(ids)) if !ids.is_empty() => ids,
            _ => return Err(ValidationError::MissingRequiredParameter { parameter: "ids" }),
        };
        if ids.len() > self.config.max_ids_in_register {
            return Err(ValidationError::MaxIdsInRegisterExceeded {
                max: self.config.max_ids_in_register,
                requested: ids.len(),
            });
        }

        let records = coerce_ids(&ids, "ids")?
            .into_iter()
            .map(|id| AppId::register(id, caller.id.as_str()))
            .collect();

        Ok(self.coordinator.allocate_all(records, 0).await)
    }

    /// Generates `numOfIds` new IDs.
    ///
    /// With `can_set_ids_in_create`, the first entries of `ids` replace the
    /// generated values (still flagged as generated) and the remaining
    /// records get random IDs. With `can_set_retries_in_create`, `retries`
    /// overrides the configured regeneration budget. Both fields are ignored
    /// otherwise.
    #[tracing::instrument(level = "debug", skip_all, fields(caller = %caller.id))]
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateRequest,
    ) -> Result<BatchOutcome, ValidationError> {
        let count = parse_count(request.num_of_ids.as_ref())?;
        let max = self.config.max_ids_in_create;
        let count = match usize::try_from(count) {
            Ok(count) if count <= max => count,
            _ => {
                return Err(ValidationError::MaxIdsInCreateExceeded {
                    max,
                    requested: count,
                });
            }
        };

        let forced = if self.config.can_set_ids_in_create {
            match request.ids {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(ids)) => coerce_ids(&ids, "ids")?,
                Some(_) => {
                    return Err(ValidationError::InvalidParameter {
                        parameter: "ids",
                        expected: "array",
                    });
                }
            }
        } else {
            Vec::new()
        };

        let retries = if self.config.can_set_retries_in_create {
            parse_retries(request.retries.as_ref())?
        } else {
            None
        }
        .unwrap_or(self.config.max_gen_retry);

        let generator = self.coordinator.allocator().generator();
        let mut forced = forced.into_iter();
        let records = (0..count)
            .map(|_| match forced.next() {
                Some(id) => AppId::new(id, caller.id.as_str(), true),
                None => AppId::generate(caller.id.as_str(), generator),
            })
            .collect();

        Ok(self.coordinator.allocate_all(records, retries).await)
    }

    /// Whether `id` is currently stored. Informational only: the answer can
    /// be stale by the time the caller acts on it.
    pub async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        self.store().exists(id).await
    }
}
