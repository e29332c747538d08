//! Inbound request payloads and their coercion rules.
//!
//! Payload fields are kept as raw JSON so that "absent", "not a list" and
//! "not a number" can be told apart and reported as validation errors instead
//! of deserialization failures.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Register caller-chosen IDs: `{"ids": [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Value>,
}

impl RegisterRequest {
    pub fn new<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            ids: Some(Value::Array(
                ids.into_iter().map(|id| Value::String(id.into())).collect(),
            )),
        }
    }
}

/// Generate new IDs: `{"numOfIds": n, "ids": [...], "retries": r}`.
///
/// `ids` and `retries` are only honored when the matching trusted-mode switch
/// of [`AllocationConfig`](crate::AllocationConfig) is on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_of_ids: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<Value>,
}

impl CreateRequest {
    pub fn with_count(count: u64) -> Self {
        Self {
            num_of_ids: Some(Value::from(count)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn forced_ids<I, T>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            ids: Some(Value::Array(
                ids.into_iter().map(|id| Value::String(id.into())).collect(),
            )),
            ..self
        }
    }

    #[must_use]
    pub fn retries(self, retries: u32) -> Self {
        Self {
            retries: Some(Value::from(retries)),
            ..self
        }
    }
}

/// Coerces one ID to its string form.
///
/// Strings are used as-is, numbers and booleans are rendered. Empty strings,
/// `null`, arrays and objects are rejected.
pub(crate) fn coerce_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerces a list of IDs, failing on the first value that is not a scalar.
pub(crate) fn coerce_ids(
    values: &[Value],
    parameter: &'static str,
) -> Result<Vec<String>, ValidationError> {
    values
        .iter()
        .map(|value| {
            coerce_id(value).ok_or(ValidationError::InvalidParameter {
                parameter,
                expected: "string",
            })
        })
        .collect()
}

/// Reads a non-negative integral JSON number.
///
/// Integral floats such as `3.0` are accepted and saturate at `u64::MAX`.
/// Anything else, including numeric strings, is `None`.
pub(crate) fn non_negative_integer(value: &Value) -> Option<u64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(n) = n.as_u64() {
        return Some(n);
    }
    let f = n.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 {
        // `as` saturates float to integer casts.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(f as u64)
    } else {
        None
    }
}

/// Number of IDs to create. Absent, `null` and `0` all mean one.
pub(crate) fn parse_count(value: Option<&Value>) -> Result<u64, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(1),
        Some(value) => match non_negative_integer(value) {
            Some(0) => Ok(1),
            Some(n) => Ok(n),
            None => Err(ValidationError::InvalidParameter {
                parameter: "numOfIds",
                expected: "number",
            }),
        },
    }
}

/// Retry budget override. `None` when absent.
pub(crate) fn parse_retries(value: Option<&Value>) -> Result<Option<u32>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => non_negative_integer(value)
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or(ValidationError::InvalidParameter {
                parameter: "retries",
                expected: "number",
            }),
    }
}
