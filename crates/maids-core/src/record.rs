//! The App ID record.

use crate::IdGenerator;
use chrono::{DateTime, SubsecRound, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

/// One allocated (or candidate) application ID plus its metadata.
///
/// The owner and creation time are fixed at construction. Regeneration never
/// mutates a record in place: [`AppId::with_id`] returns a new candidate that
/// carries the same owner and creation time.
///
/// `applied` is transient. It is set only on the value returned by a
/// successful conditional insert and is never persisted or serialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppId {
    id: String,
    created_by: String,
    created_on: DateTime<Utc>,
    is_generated: bool,
    #[serde(skip)]
    applied: bool,
}

impl AppId {
    /// Builds a candidate with the current time, truncated to milliseconds so
    /// it round-trips through the store unchanged.
    pub fn new(id: impl Into<String>, created_by: impl Into<String>, is_generated: bool) -> Self {
        Self::from_parts(id, created_by, Utc::now().trunc_subsecs(3), is_generated)
    }

    /// Rebuilds a record from stored columns.
    pub fn from_parts(
        id: impl Into<String>,
        created_by: impl Into<String>,
        created_on: DateTime<Utc>,
        is_generated: bool,
    ) -> Self {
        Self {
            id: id.into(),
            created_by: created_by.into(),
            created_on,
            is_generated,
            applied: false,
        }
    }

    /// A caller-supplied ID. Never regenerated on conflict.
    pub fn register(id: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self::new(id, created_by, false)
    }

    /// A system-generated ID drawn from `generator`.
    pub fn generate<G>(created_by: impl Into<String>, generator: &G) -> Self
    where
        G: IdGenerator + ?Sized,
    {
        Self::new(generator.next_id(), created_by, true)
    }

    /// A fresh candidate with a replacement ID, keeping owner and creation
    /// time. The result is never marked applied.
    #[must_use]
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_by: self.created_by.clone(),
            created_on: self.created_on,
            is_generated: self.is_generated,
            applied: false,
        }
    }

    #[must_use]
    pub(crate) fn into_applied(self) -> Self {
        Self {
            applied: true,
            ..self
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub const fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    pub const fn is_generated(&self) -> bool {
        self.is_generated
    }

    /// True only on the value returned by a successful conditional insert.
    pub const fn is_applied(&self) -> bool {
        self.applied
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
