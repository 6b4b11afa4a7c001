use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::error;

use super::domain::{ReviewSubmission, ReviewViolation};
use super::repository::ReviewRepository;
use super::service::{ReviewError, ReviewService};
use crate::access::AuthenticatedActor;
use crate::workflows::identity::IdentityDirectory;
use crate::workflows::jobs::domain::JobId;
use crate::workflows::jobs::repository::JobRepository;

pub fn review_router<J, V, D>(service: Arc<ReviewService<J, V, D>>) -> Router
where
    J: JobRepository + 'static,
    V: ReviewRepository + 'static,
    D: IdentityDirectory + 'static,
{
    Router::new()
        .route("/jobs/:job_id/rate-worker", post(rate_worker_handler::<J, V, D>))
        .route("/jobs/:job_id/rate-client", post(rate_client_handler::<J, V, D>))
        .with_state(service)
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "review request failed");
        }
        let payload = json!({
            "error": self.public_message(),
            "code": self.code(),
        });
        (status, Json(payload)).into_response()
    }
}

fn read_submission(
    payload: Result<Json<ReviewSubmission>, JsonRejection>,
) -> Result<ReviewSubmission, ReviewError> {
    payload.map(|Json(submission)| submission).map_err(|rejection| {
        ReviewError::Validation(ReviewViolation::Malformed(rejection.body_text()))
    })
}

async fn rate_worker_handler<J, V, D>(
    State(service): State<Arc<ReviewService<J, V, D>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
    payload: Result<Json<ReviewSubmission>, JsonRejection>,
) -> Response
where
    J: JobRepository + 'static,
    V: ReviewRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let client = match actor.as_client() {
        Ok(client) => client,
        Err(err) => return err.into_response(),
    };
    let outcome = read_submission(payload)
        .and_then(|submission| service.rate_worker(client, &JobId(job_id), &submission));
    match outcome {
        Ok(review) => (StatusCode::CREATED, Json(review)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn rate_client_handler<J, V, D>(
    State(service): State<Arc<ReviewService<J, V, D>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
    payload: Result<Json<ReviewSubmission>, JsonRejection>,
) -> Response
where
    J: JobRepository + 'static,
    V: ReviewRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let worker = match actor.as_worker() {
        Ok(worker) => worker,
        Err(err) => return err.into_response(),
    };
    let outcome = read_submission(payload)
        .and_then(|submission| service.rate_client(worker, &JobId(job_id), &submission));
    match outcome {
        Ok(review) => (StatusCode::CREATED, Json(review)).into_response(),
        Err(err) => err.into_response(),
    }
}
