//! REST control surface for the kernel fleet.
//!
//! Endpoints under `/kernel`:
//!   HEAD/GET `/kernel/{id}` — liveness / connection info
//!   GET      `/kernel`      — list kernel ids
//!   POST     `/kernel`      — launch (no-op when the id is already live)
//!   DELETE   `/kernel/{id}` — restart (signal 0/SIGTERM) or scram
//!   DELETE   `/kernel`      — scram all
//!
//! Authentication is the host's concern: when a validator callback is
//! configured, the `Authorization` header is passed to it opaquely.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header::AUTHORIZATION};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::jupyter::connection::KernelInit;
use crate::supervisor::{Supervisor, SupervisorError};

const SIGTERM: i64 = 15;

/// Opaque `Authorization` header validator supplied by the host.
pub type AuthValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub struct ApiState {
    pub supervisor: Arc<Supervisor>,
    pub auth: Option<AuthValidator>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/kernel", get(list_kernels).post(launch_kernel).delete(scram_all))
        .route("/kernel/{id}", get(get_kernel).delete(scram_kernel))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

async fn require_auth(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(validator) = &state.auth {
        let authorized = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| validator(value))
            .unwrap_or(false);
        if !authorized {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    next.run(request).await
}

/// 400 bodies carry a formatted trace of what went wrong with the request.
fn bad_request(context: &str, detail: impl std::fmt::Display) -> Response {
    let body = format!(
        "Traceback (most recent call last):\n  File \"<{context}>\", line 1, in <request>\nValueError: {detail}\n"
    );
    (StatusCode::BAD_REQUEST, body).into_response()
}

async fn list_kernels(State(state): State<Arc<ApiState>>) -> Response {
    axum::Json(state.supervisor.kernel_ids()).into_response()
}

async fn get_kernel(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Response {
    match state.supervisor.lookup(&id).and_then(|h| h.connection_info()) {
        Some(info) => axum::Json(info).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn launch_kernel(State(state): State<Arc<ApiState>>, body: String) -> Response {
    let init: KernelInit = if body.trim().is_empty() {
        KernelInit::default()
    } else {
        match serde_json::from_str(&body) {
            Ok(init) => init,
            Err(err) => return bad_request("kernel launch", err),
        }
    };

    // launching an id that is already live is a no-op returning its info
    if let Some(kernel_id) = init.kernel_id.as_deref()
        && let Some(existing) = state.supervisor.lookup(kernel_id)
    {
        warn!(kernel_id, "kernel already running");
        if let Some(info) = existing.connection_info() {
            warn_config_mismatches(&init, &info);
            return axum::Json(info).into_response();
        }
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.supervisor.launch(init).await {
        Ok(handle) => match handle.connection_info() {
            Some(info) => {
                info!(kernel_id = %info.ignition_kernel_id, "launched via REST");
                axum::Json(info).into_response()
            }
            None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        },
        Err(SupervisorError::Duplicate(id)) => {
            (StatusCode::CONFLICT, format!("kernel {id} already started")).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

fn warn_config_mismatches(init: &KernelInit, live: &crate::jupyter::ConnectionInfo) {
    let mut mismatched: Vec<&str> = Vec::new();
    if init.key.as_deref().is_some_and(|key| key != live.key) {
        mismatched.push("key");
    }
    if init
        .signature_scheme
        .as_deref()
        .is_some_and(|scheme| scheme != live.signature_scheme)
    {
        mismatched.push("signature_scheme");
    }
    if init.ip.as_deref().is_some_and(|ip| ip != live.ip) {
        mismatched.push("ip");
    }
    if init
        .transport
        .as_deref()
        .is_some_and(|transport| transport != live.transport)
    {
        mismatched.push("transport");
    }
    for field in mismatched {
        warn!(
            kernel_id = %live.ignition_kernel_id,
            field,
            "config mismatch against running kernel"
        );
    }
}

#[derive(Debug, Default, Deserialize)]
struct DeleteBody {
    #[serde(default)]
    signal: Option<i64>,
}

async fn scram_kernel(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    body: String,
) -> Response {
    let payload: DeleteBody = if body.trim().is_empty() {
        DeleteBody::default()
    } else {
        match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(err) => return bad_request("kernel delete", err),
        }
    };

    // signal 0/SIGTERM replaces the execution session and keeps the kernel
    if let Some(signal) = payload.signal
        && (signal == 0 || signal == SIGTERM)
    {
        return match state.supervisor.lookup(&id) {
            Some(handle) => match handle.restart() {
                Ok(()) => axum::Json(json!({"scrammed": []})).into_response(),
                Err(_) => StatusCode::NOT_FOUND.into_response(),
            },
            None => StatusCode::NOT_FOUND.into_response(),
        };
    }

    warn!(kernel_id = %id, "DELETE request made to scram kernel");
    match state.supervisor.scram(&id).await {
        Ok(()) => axum::Json(json!({"scrammed": [id]})).into_response(),
        Err(_) => axum::Json(json!({"scrammed": []})).into_response(),
    }
}

async fn scram_all(State(state): State<Arc<ApiState>>) -> Response {
    warn!("DELETE request made to scram ALL kernels");
    let scrammed = state.supervisor.scram_all().await;
    axum::Json(json!({"scrammed": scrammed})).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_body_reads_like_a_traceback() {
        let response = bad_request("kernel launch", "expected value at line 1");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn delete_body_parses_signal() {
        let payload: DeleteBody = serde_json::from_str(r#"{"signal": 15}"#).unwrap();
        assert_eq!(payload.signal, Some(15));
        let payload: DeleteBody = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.signal, None);
    }
}
