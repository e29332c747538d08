//! Access token middleware.
//!
//! Every route requires the shared API token, read from the `Authorization`
//! header (with or without a `Bearer ` prefix) or from the `access_token`
//! query parameter. The caller identity comes from the `X-User-Id` header set
//! by the upstream gateway and is handed to handlers as a [`Caller`]
//! extension.

use super::handler::{AppState, record_reply};
use super::reply::Reply;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Request, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use maids_core::{Caller, Error};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;

pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn require_access_token(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    let token = bearer_token(request.headers())
        .or_else(|| query_token(request.uri()))
        .unwrap_or_default();
    if !token_matches(&token, &state.api_token) {
        tracing::debug!("Rejected request without a valid access token");
        return unauthorized(request_id, &state, started);
    }

    let Some(caller) = caller_id(request.headers()) else {
        tracing::debug!("Rejected request without a caller identity");
        return unauthorized(request_id, &state, started);
    };

    request.extensions_mut().insert(Caller::new(caller));
    request.extensions_mut().insert(RequestId(request_id));
    next.run(request).await
}

/// Identifier echoed as the reply `id`.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

fn unauthorized(request_id: String, state: &AppState, started: Instant) -> Response {
    let reply = Reply::error(request_id, &Error::Unauthorized, state.output_stack_trace);
    record_reply(&reply, started);
    reply.into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value);
    Some(token.trim().to_owned())
}

#[derive(Debug, Deserialize)]
struct AccessTokenQuery {
    access_token: Option<String>,
}

fn query_token(uri: &Uri) -> Option<String> {
    Query::<AccessTokenQuery>::try_from_uri(uri)
        .ok()?
        .0
        .access_token
}

fn token_matches(token: &str, expected: &str) -> bool {
    !token.is_empty() && bool::from(token.as_bytes().ct_eq(expected.as_bytes()))
}

fn caller_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}
