//! HTTP routes for App ID registration, creation and health.
//!
//! Every route sits behind [`require_access_token`], which resolves the
//! [`Caller`] and the reply [`RequestId`] before a handler runs. Handlers only
//! translate between JSON and [`AppIdService`]; all allocation semantics live
//! in `maids-core`.

use super::auth::{RequestId, require_access_token};
use super::reply::Reply;
use crate::server::store::Backend;
use crate::server::telemetry::{
    increment_id_conflicts, increment_ids_allocated, increment_request_errors,
    increment_requests, increment_store_errors, record_ids_per_request, record_request_duration,
};
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::routing::{get, post};
use axum::{Router, middleware};
use maids_core::{
    AppIdService, BatchOutcome, Caller, CreateRequest, Error, RegisterRequest, ValidationError,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Debug)]
pub struct AppState {
    pub service: AppIdService<Backend>,
    pub api_token: String,
    pub output_stack_trace: bool,
}

/// Builds the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/maids/{version}/appids", post(create))
        .route("/maids/{version}/appids/register", post(register))
        .route("/maids/{version}/appids/{id}", get(exists))
        .route("/maids/{version}/health/status", get(health_status))
        .route("/maids/{version}/health/version", get(health_version))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_access_token,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tracing::instrument(name = "register", skip_all, fields(request_id = %request_id.0, caller = %caller.id))]
async fn register(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Reply {
    let started = Instant::now();
    let reply = match parse_body::<RegisterRequest>(&body) {
        Ok(request) => match state.service.register(&caller, request).await {
            Ok(outcome) => batch_reply(&state, request_id.0, outcome),
            Err(err) => Reply::error(request_id.0, &Error::from(err), state.output_stack_trace),
        },
        Err(err) => Reply::error(request_id.0, &Error::from(err), state.output_stack_trace),
    };
    record_reply(&reply, started);
    reply
}

#[tracing::instrument(name = "create", skip_all, fields(request_id = %request_id.0, caller = %caller.id))]
async fn create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Reply {
    let started = Instant::now();
    let reply = match parse_body::<CreateRequest>(&body) {
        Ok(request) => match state.service.create(&caller, request).await {
            Ok(outcome) => batch_reply(&state, request_id.0, outcome),
            Err(err) => Reply::error(request_id.0, &Error::from(err), state.output_stack_trace),
        },
        Err(err) => Reply::error(request_id.0, &Error::from(err), state.output_stack_trace),
    };
    record_reply(&reply, started);
    reply
}

/// Reports whether an App ID is stored. The answer may be stale by the time
/// the caller acts on it.
#[tracing::instrument(name = "exists", skip_all, fields(request_id = %request_id.0))]
async fn exists(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((_version, id)): Path<(String, String)>,
) -> Reply {
    let started = Instant::now();
    let reply = match state.service.exists(&id).await {
        Ok(exists) => Reply::ok(request_id.0, json!({ "id": id, "exists": exists })),
        Err(err) => {
            increment_store_errors(1);
            Reply::error(request_id.0, &Error::from(err), state.output_stack_trace)
        }
    };
    record_reply(&reply, started);
    reply
}

async fn health_status(Extension(request_id): Extension<RequestId>) -> Reply {
    Reply::ok(request_id.0, json!({ "status": 200 }))
}

async fn health_version(Extension(request_id): Extension<RequestId>) -> Reply {
    Reply::ok(
        request_id.0,
        json!({ "version": env!("CARGO_PKG_VERSION") }),
    )
}

/// Parses a JSON request body. A blank body means every field takes its
/// default.
fn parse_body<T>(body: &[u8]) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!("Rejected request body: {err}");
        ValidationError::InvalidParameter {
            parameter: "body",
            expected: "json",
        }
    })
}

fn batch_reply(state: &AppState, request_id: String, outcome: BatchOutcome) -> Reply {
    let conflicts = outcome.conflicts();
    let store_errors = outcome.errors.len() - conflicts;

    record_ids_per_request((outcome.successes.len() + outcome.errors.len()) as f64);
    increment_ids_allocated(outcome.successes.len() as u64);
    increment_id_conflicts(conflicts as u64);
    increment_store_errors(store_errors as u64);

    if outcome.is_failed() {
        tracing::info!(
            "Stored {} App IDs, {} conflicts, {} store errors",
            outcome.successes.len(),
            conflicts,
            store_errors
        );
    } else {
        tracing::debug!("Stored {} App IDs", outcome.successes.len());
    }

    Reply::batch(request_id, outcome, state.output_stack_trace)
}

pub(super) fn record_reply(reply: &Reply, started: Instant) {
    increment_requests();
    record_request_duration(started.elapsed().as_secs_f64() * 1000.0);
    if !reply.is_ok() {
        increment_request_errors();
    }
}
