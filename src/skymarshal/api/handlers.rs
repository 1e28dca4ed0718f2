//! Axum route handlers for the async request surface (C8, spec.md §4.8,
//! §6.1), adapted from `src/api/lambda_handler_async.py`'s
//! `handle_invoke_async`/`handle_status_check`/`process_request_async` to a
//! standing HTTP service instead of a Lambda invoked twice per request.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::skymarshal::api::request_store::RequestStore;
use crate::skymarshal::api::session_store::SessionStore;
use crate::skymarshal::api::validation::{sanitize_prompt, validate_invoke_request, InvokeRequestBody};
use crate::skymarshal::config::SkymarshalConfig;
use crate::skymarshal::model::{RequestRecord, RequestStatus, SessionRecord};
use crate::skymarshal::orchestrator::PhaseOrchestrator;
use crate::skymarshal::report::generate_decision_report;

/// Shared state handed to every route, cloned cheaply via `Arc`s (spec.md
/// §5 "shared-resource policy").
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PhaseOrchestrator>,
    pub requests: Arc<dyn RequestStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: SkymarshalConfig,
}

const CORS_ORIGIN: (header::HeaderName, &str) = (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");

fn error_response(status: StatusCode, error_code: &str, error_message: &str, request_id: Uuid) -> Response {
    (
        status,
        [CORS_ORIGIN],
        Json(json!({
            "error_code": error_code,
            "error_message": error_message,
            "request_id": request_id,
            "status_code": status.as_u16(),
        })),
    )
        .into_response()
}

/// `POST /invoke` (spec.md §4.8, §6.1): validates the body, persists a
/// `processing` request record, dispatches the orchestration as a background
/// task, and returns 202 immediately.
pub async fn invoke(State(state): State<AppState>, body: String) -> Response {
    let request_id = Uuid::new_v4();

    let parsed: InvokeRequestBody = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, "INVALID_JSON", "Request body must be valid JSON", request_id)
        }
    };

    let validation = validate_invoke_request(&parsed);
    if !validation.is_valid {
        let message = validation.validation_errors.join(" ");
        return error_response(StatusCode::BAD_REQUEST, "INVALID_REQUEST", &message, request_id);
    }

    let prompt = sanitize_prompt(&parsed.prompt.expect("validated non-empty above"));
    let session_id = parsed.session_id;

    let record = RequestRecord::new(request_id, prompt.clone(), session_id, state.config.request_ttl.as_secs() as i64);
    if let Err(err) = state.requests.put(record).await {
        log::error!("failed to persist request {}: {}", request_id, err);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Failed to start processing", request_id);
    }

    tokio::spawn(process_request(state.clone(), request_id, prompt, session_id));

    log::info!("started async processing for request {}", request_id);

    (
        StatusCode::ACCEPTED,
        [CORS_ORIGIN],
        Json(json!({
            "status": "accepted",
            "request_id": request_id,
            "message": "Request accepted for processing. Poll /status/{request_id} for results.",
            "poll_url": format!("/status/{}", request_id),
        })),
    )
        .into_response()
}

/// Runs one orchestration in the background and writes the terminal request
/// (and, when a session is in play, session history) record — the standing-
/// service equivalent of `process_request_async`'s self-invocation.
async fn process_request(state: AppState, request_id: Uuid, prompt: String, session_id: Option<Uuid>) {
    let started = Instant::now();

    let outcome = tokio::time::timeout(state.config.background_job_timeout, state.orchestrator.run(&prompt)).await;

    let execution_time_ms = started.elapsed().as_millis() as i64;
    let now = chrono::Utc::now();

    let mut record = match state.requests.get(request_id).await {
        Ok(Some(record)) => record,
        _ => {
            log::error!("request {} vanished from the store before completion", request_id);
            return;
        }
    };
    record.updated_at = now;
    record.execution_time_ms = Some(Decimal::from(execution_time_ms));

    match outcome {
        Err(_elapsed) => {
            log::error!("request {} timed out after {}ms", request_id, execution_time_ms);
            record.status = RequestStatus::Error;
            record.error = Some("Agent execution exceeded timeout".to_string());
            record.error_code = Some("TIMEOUT".to_string());
        }
        Ok(Err(err)) => {
            log::error!("request {} failed: {}", request_id, err);
            record.status = RequestStatus::Error;
            record.error = Some(err.to_string());
            record.error_code = Some("PROCESSING_ERROR".to_string());
        }
        Ok(Ok(result)) => {
            let report = generate_decision_report(result.arbitrator_output, &request_id.to_string());
            let resolved_session_id = session_id.unwrap_or_else(|| state.sessions.create_session());

            let interaction = SessionRecord {
                session_id: resolved_session_id,
                timestamp: now.timestamp_millis(),
                request_id,
                prompt: prompt.clone(),
                response: serde_json::to_string(&report).ok(),
                status: RequestStatus::Complete,
                execution_time_ms: Some(Decimal::from(execution_time_ms)),
                error_message: None,
                ttl: now.timestamp() + state.config.session_ttl.as_secs() as i64,
            };
            if let Err(err) = state.sessions.save_interaction(interaction).await {
                log::warn!("failed to save session {} for request {}: {}", resolved_session_id, request_id, err);
            }

            record.status = RequestStatus::Complete;
            record.session_id = Some(resolved_session_id);
            record.assessment = Some(report);
        }
    }

    if let Err(err) = state.requests.update(record).await {
        log::error!("failed to persist terminal status for request {}: {}", request_id, err);
    }

    log::info!("request {} finished in {}ms", request_id, execution_time_ms);
}

/// `GET /status/{request_id}` (spec.md §4.8, §6.1).
pub async fn status(State(state): State<AppState>, Path(request_id): Path<Uuid>) -> Response {
    let record = match state.requests.get(request_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                [CORS_ORIGIN],
                Json(json!({"error": "Request not found", "request_id": request_id})),
            )
                .into_response()
        }
        Err(err) => {
            log::error!("failed to read status for request {}: {}", request_id, err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [CORS_ORIGIN],
                Json(json!({"error": "Failed to check status", "request_id": request_id})),
            )
                .into_response();
        }
    };

    let mut body = json!({
        "request_id": record.request_id,
        "status": record.status,
        "created_at": record.created_at,
        "updated_at": record.updated_at,
    });

    match record.status {
        RequestStatus::Complete => {
            body["assessment"] = json!(record.assessment);
            body["session_id"] = json!(record.session_id);
            body["execution_time_ms"] = json!(record.execution_time_ms);
        }
        RequestStatus::Error => {
            body["error"] = json!(record.error.unwrap_or_default());
            body["error_code"] = json!(record.error_code.unwrap_or_default());
        }
        RequestStatus::Processing => {}
    }

    (StatusCode::OK, [CORS_ORIGIN], Json(body)).into_response()
}
