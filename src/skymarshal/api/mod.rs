//! Async Request Surface (C8, spec.md §4.8, §6.1): an axum service exposing
//! `POST /invoke` and `GET /status/{request_id}`, adapted from
//! `src/api/lambda_handler_async.py` to a standing process instead of a
//! Lambda (no AWS SDK dependency — stores are trait objects, in-memory by
//! default).

pub mod handlers;
pub mod request_store;
pub mod session_store;
pub mod validation;

use axum::routing::{get, post};
use axum::Router;

pub use handlers::AppState;

/// Builds the two-route service described in spec.md §6.1.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/invoke", post(handlers::invoke))
        .route("/status/{request_id}", get(handlers::status))
        .with_state(state)
}
