use crate::infra::{AppState, Marketplace};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json, Router};
use gigline::access::SharedSessions;
use gigline::workflows::jobs::job_router;
use gigline::workflows::reporting::reporting_router;
use gigline::workflows::reviews::review_router;
use gigline::workflows::verification::verification_router;
use serde_json::json;
use std::sync::Arc;

/// Every marketplace route plus the operational endpoints, with sessions installed.
pub(crate) fn marketplace_app(marketplace: &Marketplace, state: AppState) -> Router {
    let sessions: SharedSessions = Arc::new(marketplace.sessions.clone());

    job_router(marketplace.jobs.clone())
        .merge(review_router(marketplace.reviews.clone()))
        .merge(verification_router(marketplace.verification.clone()))
        .merge(reporting_router(marketplace.reporting.clone()))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .layer(Extension(sessions))
        .layer(Extension(state))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
