//! JSON reply envelope shared by every route.
//!
//! ```json
//! { "id": "<request uuid>", "status": 200, "errors": [], "response": [...] }
//! ```
//!
//! `status` doubles as the HTTP status code: 200 without errors, otherwise
//! the status of the first error.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use maids_core::{AppId, BatchOutcome, Error};
use serde::Serialize;
use serde_json::Value;

/// One rendered error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorObject {
    /// Position of the failed item for per-item errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub code: String,
    pub message: String,
    pub message_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_data: Option<AppId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip)]
    status: u16,
}

impl ErrorObject {
    pub fn new(error: &Error, index: Option<usize>, with_detail: bool) -> Self {
        Self {
            index,
            code: error.message_key().code(),
            message: error.render(),
            message_data: error.message_data(),
            reference_data: error.reference_record().cloned(),
            detail: with_detail.then(|| format!("{error:?}")),
            status: error.status(),
        }
    }

    pub const fn status(&self) -> u16 {
        self.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: String,
    pub status: u16,
    pub errors: Vec<ErrorObject>,
    pub response: Value,
}

impl Reply {
    pub fn ok(id: impl Into<String>, response: Value) -> Self {
        Self {
            id: id.into(),
            status: 200,
            errors: Vec::new(),
            response,
        }
    }

    /// A reply for a request rejected as a whole.
    pub fn error(id: impl Into<String>, error: &Error, with_detail: bool) -> Self {
        Self::ok(id, Value::Null).with_errors(vec![ErrorObject::new(error, None, with_detail)])
    }

    /// A reply carrying the stored records and one error per failed item.
    pub fn batch(id: impl Into<String>, outcome: BatchOutcome, with_detail: bool) -> Self {
        let errors = outcome
            .errors
            .into_iter()
            .map(|item| ErrorObject::new(&Error::from(item.error), Some(item.index), with_detail))
            .collect();
        let response = serde_json::to_value(outcome.successes).unwrap_or(Value::Null);
        Self::ok(id, response).with_errors(errors)
    }

    fn with_errors(self, errors: Vec<ErrorObject>) -> Self {
        let status = errors.first().map_or(200, ErrorObject::status);
        Self {
            status,
            errors,
            ..self
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
