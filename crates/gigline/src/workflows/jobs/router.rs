use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::browse::AvailableJobsQuery;
use super::domain::{Job, JobId, JobSubmission, JobSummary, Urgency};
use super::repository::JobRepository;
use super::service::{JobLifecycleService, JobServiceError};
use crate::access::{AccessError, AuthenticatedActor};
use crate::integrations::media::{MediaStore, MediaUpload};
use crate::workflows::identity::IdentityDirectory;

/// Router builder exposing the job lifecycle endpoints.
pub fn job_router<R, D, M>(service: Arc<JobLifecycleService<R, D, M>>) -> Router
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    Router::new()
        .route("/jobs/create", post(create_handler::<R, D, M>))
        .route("/jobs/available", get(available_handler::<R, D, M>))
        .route("/jobs/mine", get(mine_handler::<R, D, M>))
        .route("/jobs/:job_id", get(detail_handler::<R, D, M>))
        .route("/jobs/:job_id/accept", post(accept_handler::<R, D, M>))
        .route("/jobs/:job_id/start", put(start_handler::<R, D, M>))
        .route(
            "/jobs/:job_id/generate-otp",
            get(generate_code_handler::<R, D, M>),
        )
        .route("/jobs/:job_id/complete", post(complete_handler::<R, D, M>))
        .route("/jobs/:job_id/cancel", put(cancel_handler::<R, D, M>))
        .route(
            "/jobs/:job_id/cancel-worker",
            put(release_handler::<R, D, M>),
        )
        .with_state(service)
}

type SharedService<R, D, M> = State<Arc<JobLifecycleService<R, D, M>>>;

/// Failure of a job endpoint, rendered as `{ "error", "code" }`.
#[derive(Debug)]
pub enum JobApiError {
    Access(AccessError),
    Service(JobServiceError),
}

impl From<AccessError> for JobApiError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<JobServiceError> for JobApiError {
    fn from(value: JobServiceError) -> Self {
        Self::Service(value)
    }
}

impl IntoResponse for JobServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "job request failed");
        }
        let payload = json!({
            "error": self.public_message(),
            "code": self.code(),
        });
        (status, Json(payload)).into_response()
    }
}

impl IntoResponse for JobApiError {
    fn into_response(self) -> Response {
        match self {
            JobApiError::Access(err) => err.into_response(),
            JobApiError::Service(err) => err.into_response(),
        }
    }
}

fn job_response(status: StatusCode, job: &Job) -> Response {
    (status, Json(job.summary())).into_response()
}

pub(crate) async fn create_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    multipart: Multipart,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let client = actor.as_client()?;
    let (submission, image) = read_job_form(multipart).await?;
    let job = service.create(client, submission, image).await?;
    Ok(job_response(StatusCode::CREATED, &job))
}

pub(crate) async fn available_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<AvailableJobsQuery>,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let worker = actor.as_worker()?;
    let page = service.available(worker, query).await?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

pub(crate) async fn mine_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let jobs: Vec<JobSummary> = service
        .list_mine(&actor)?
        .iter()
        .map(Job::summary)
        .collect();
    Ok((StatusCode::OK, Json(json!({ "jobs": jobs }))).into_response())
}

pub(crate) async fn detail_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let job = service.get(&actor, &JobId(job_id))?;
    Ok(job_response(StatusCode::OK, &job))
}

pub(crate) async fn accept_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let worker = actor.as_worker()?;
    let job = service.accept(worker, &JobId(job_id))?;
    Ok(job_response(StatusCode::OK, &job))
}

pub(crate) async fn start_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let client = actor.as_client()?;
    let job = service.start(client, &JobId(job_id))?;
    Ok(job_response(StatusCode::OK, &job))
}

pub(crate) async fn generate_code_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let worker = actor.as_worker()?;
    let code = service.issue_completion_code(worker, &JobId(job_id))?;
    Ok((StatusCode::OK, Json(json!({ "otp": code.as_str() }))).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompletionRequest {
    #[serde(default)]
    otp: String,
}

pub(crate) async fn complete_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let client = actor.as_client()?;
    let Json(request) = payload
        .map_err(|rejection| JobServiceError::Validation(rejection.body_text()))?;
    let job = service.complete(client, &JobId(job_id), &request.otp)?;
    Ok(job_response(StatusCode::OK, &job))
}

pub(crate) async fn cancel_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let client = actor.as_client()?;
    let removed = service.cancel_by_client(client, &JobId(job_id)).await?;
    let payload = json!({
        "job_id": removed.id,
        "deleted": true,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn release_handler<R, D, M>(
    State(service): SharedService<R, D, M>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(job_id): Path<String>,
) -> Result<Response, JobApiError>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    let worker = actor.as_worker()?;
    let job = service.release_by_worker(worker, &JobId(job_id))?;
    Ok(job_response(StatusCode::OK, &job))
}

/// Collect the multipart job form. Unknown parts are ignored.
async fn read_job_form(
    mut multipart: Multipart,
) -> Result<(JobSubmission, Option<MediaUpload>), JobServiceError> {
    let mut submission = JobSubmission::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed_form)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(malformed_form)?;
            if !bytes.is_empty() {
                image = Some(MediaUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await.map_err(malformed_form)?;
        match name.as_str() {
            "title" => submission.title = value,
            "description" => submission.description = value,
            "skill" => submission.skill = value,
            "urgency" => {
                submission.urgency = Urgency::parse(&value).ok_or_else(|| {
                    JobServiceError::Validation(format!("unknown urgency '{}'", value.trim()))
                })?;
            }
            "city" => submission.city = Some(value),
            "latitude" => submission.latitude = parse_coordinate("latitude", &value)?,
            "longitude" => submission.longitude = parse_coordinate("longitude", &value)?,
            _ => {}
        }
    }

    Ok((submission, image))
}

fn parse_coordinate(field: &str, raw: &str) -> Result<Option<f64>, JobServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| JobServiceError::Validation(format!("{field} must be a number")))
}

fn malformed_form(err: axum::extract::multipart::MultipartError) -> JobServiceError {
    JobServiceError::Validation(format!("malformed form data: {err}"))
}
