//! Error types for the App ID allocation pipeline.
//!
//! Errors are split by the scope they affect:
//!
//! - [`ValidationError`]: the request was malformed or out of bounds. Raised
//!   before any store access and fatal for the whole request.
//! - [`AllocationError`]: a single item of a batch failed, either because its
//!   ID already exists ([`AllocationError::DuplicateId`]) or because the store
//!   failed ([`AllocationError::Store`]). Sibling items are unaffected.
//! - [`StoreError`]: an infrastructure failure reported by a
//!   [`ConditionalStore`](crate::ConditionalStore) without interpretation.
//!
//! [`Error`] unifies them for reply rendering. Every variant maps to a stable
//! [`MessageKey`] and a JSON object of message parameters.

use crate::{AppId, MessageKey};
use serde_json::{Value, json};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// An infrastructure failure from the persistence backend.
///
/// A store error never means "the ID exists". In particular a timed-out write
/// is reported as [`StoreError::Timeout`] even though the write may have
/// landed.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The operation did not complete within the configured bound.
    #[error("Store operation `{operation}` timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The backend could not be reached or is busy.
    #[error("Store unavailable: {context}")]
    Unavailable { context: String },

    /// Any other backend failure (bad schema, I/O, corrupt row).
    #[error("Store backend error: {context}")]
    Backend { context: String },
}

/// Terminal failure of a single allocation.
#[derive(Clone, thiserror::Error, Debug, PartialEq)]
pub enum AllocationError {
    /// The ID already exists and was not eligible for (or ran out of)
    /// regeneration. Never retried outside the allocator.
    #[error("App ID \"{record}\" already exists")]
    DuplicateId { record: AppId },

    /// The store failed while inserting this record.
    #[error("Failed to store App ID \"{record}\": {source}")]
    Store {
        record: AppId,
        #[source]
        source: StoreError,
    },
}

impl AllocationError {
    /// The candidate record as it was when the allocation stopped.
    pub const fn record(&self) -> &AppId {
        match self {
            Self::DuplicateId { record } | Self::Store { record, .. } => record,
        }
    }

    /// The rejected ID.
    pub fn id(&self) -> &str {
        self.record().id()
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateId { .. })
    }
}

/// The request was rejected before reaching the store.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter `{parameter}`")]
    MissingRequiredParameter { parameter: &'static str },

    #[error("Invalid parameter `{parameter}`, expected {expected}")]
    InvalidParameter {
        parameter: &'static str,
        expected: &'static str,
    },

    #[error("Cannot register {requested} App IDs, the maximum is {max}")]
    MaxIdsInRegisterExceeded { max: usize, requested: usize },

    #[error("Cannot create {requested} App IDs, the maximum is {max}")]
    MaxIdsInCreateExceeded { max: usize, requested: u64 },
}

/// Unified error type used to render replies.
#[derive(Clone, thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller did not present a valid access token or identity.
    #[error("Unauthorized")]
    Unauthorized,
}

impl Error {
    /// Message catalog key for this error.
    pub const fn message_key(&self) -> MessageKey {
        match self {
            Self::Validation(ValidationError::MissingRequiredParameter { .. }) => {
                MessageKey::MissingRequiredParameter
            }
            Self::Validation(ValidationError::InvalidParameter { .. }) => {
                MessageKey::InvalidParameter
            }
            Self::Validation(ValidationError::MaxIdsInRegisterExceeded { .. }) => {
                MessageKey::MaxNumOfIdsInRegisterExceeded
            }
            Self::Validation(ValidationError::MaxIdsInCreateExceeded { .. }) => {
                MessageKey::MaxNumOfIdsInCreatedExceeded
            }
            Self::Allocation(AllocationError::DuplicateId { .. }) => MessageKey::DuplicateAppId,
            Self::Allocation(AllocationError::Store { .. }) | Self::Store(_) => {
                MessageKey::StoreUnavailable
            }
            Self::Unauthorized => MessageKey::Unauthorized,
        }
    }

    /// Parameters substituted into the rendered message.
    pub fn message_data(&self) -> Value {
        match self {
            Self::Validation(ValidationError::MissingRequiredParameter { parameter }) => {
                json!({ "parameter": parameter })
            }
            Self::Validation(ValidationError::InvalidParameter {
                parameter,
                expected,
            }) => json!({ "parameter": parameter, "type": expected }),
            Self::Validation(ValidationError::MaxIdsInRegisterExceeded { max, requested }) => {
                json!({ "maxNumOfIds": max, "numOfIds": requested })
            }
            Self::Validation(ValidationError::MaxIdsInCreateExceeded { max, requested }) => {
                json!({ "maxNumOfIds": max, "numOfIds": requested })
            }
            Self::Allocation(err) => json!({ "id": err.id() }),
            Self::Store(_) | Self::Unauthorized => json!({}),
        }
    }

    /// The record the error refers to, if any.
    pub const fn reference_record(&self) -> Option<&AppId> {
        match self {
            Self::Allocation(err) => Some(err.record()),
            _ => None,
        }
    }

    /// Human readable message rendered from the catalog.
    pub fn render(&self) -> String {
        self.message_key().render(&self.message_data())
    }

    /// HTTP-style status derived from the message key.
    pub fn status(&self) -> u16 {
        self.message_key().status()
    }
}
