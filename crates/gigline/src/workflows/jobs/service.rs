use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use tracing::{info, warn};

use super::completion::{CompletionCodeSource, RandomCompletionCodes};
use super::domain::{ClientId, Job, JobId, JobStatus, JobSubmission, PaymentStatus, WorkerId};
use super::intake::{draft_from_submission, IntakeViolation};
use super::lifecycle::{JobMatch, JobOperation, JobUpdate, TransitionError};
use super::repository::{JobRepository, RepositoryError};
use crate::access::Actor;
use crate::integrations::distance::DistanceEstimator;
use crate::integrations::media::{MediaError, MediaStore, MediaUpload};
use crate::workflows::identity::{DirectoryError, IdentityDirectory};

/// Service owning the job state machine. Every transition goes through a conditional
/// write on the repository; nothing here holds a lock across calls.
pub struct JobLifecycleService<R, D, M> {
    pub(crate) repository: Arc<R>,
    pub(crate) directory: Arc<D>,
    pub(crate) media: Arc<M>,
    pub(crate) distance: Arc<DistanceEstimator>,
    pub(crate) codes: Arc<dyn CompletionCodeSource>,
    pub(crate) media_folder: String,
}

static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_job_id() -> JobId {
    let id = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    JobId(format!("job-{id:06}"))
}

/// The caller on whose behalf a conditional write was attempted.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Party<'a> {
    Client(&'a ClientId),
    Worker(&'a WorkerId),
}

impl<R, D, M> JobLifecycleService<R, D, M>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<D>,
        media: Arc<M>,
        distance: Arc<DistanceEstimator>,
    ) -> Self {
        Self {
            repository,
            directory,
            media,
            distance,
            codes: Arc::new(RandomCompletionCodes),
            media_folder: "jobs".to_string(),
        }
    }

    pub fn with_code_source(mut self, codes: Arc<dyn CompletionCodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub fn with_media_folder(mut self, folder: impl Into<String>) -> Self {
        self.media_folder = folder.into();
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Post a new job. A failed image upload is logged and the job is stored without one.
    pub async fn create(
        &self,
        client: &ClientId,
        submission: JobSubmission,
        image: Option<MediaUpload>,
    ) -> Result<Job, JobServiceError> {
        let draft = draft_from_submission(submission)?;

        let image = match image {
            Some(upload) if !upload.is_image() => {
                return Err(JobServiceError::Validation(
                    "attachment must be an image".to_string(),
                ));
            }
            Some(upload) => match self.media.upload(upload, &self.media_folder).await {
                Ok(asset) => Some(asset),
                Err(err) => {
                    warn!(
                        client_id = %client,
                        error = %err,
                        "job image upload failed; posting without image"
                    );
                    None
                }
            },
            None => None,
        };

        let job = Job {
            id: next_job_id(),
            client_id: client.clone(),
            worker_id: None,
            title: draft.title,
            description: draft.description,
            skill: draft.skill,
            urgency: draft.urgency,
            location: draft.location,
            status: JobStatus::Posted,
            image,
            completion_otp: None,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
        };

        let stored = self.repository.insert(job)?;
        info!(job_id = %stored.id, client_id = %client, skill = %stored.skill, "job posted");
        Ok(stored)
    }

    /// Move an assigned job to active on behalf of its owner.
    pub fn start(&self, client: &ClientId, job_id: &JobId) -> Result<Job, JobServiceError> {
        let predicate = JobMatch::for_operation(JobOperation::Start).owned_by(client);
        let update = JobUpdate::Start { at: Utc::now() };

        match self.repository.update_where(job_id, &predicate, &update)? {
            Some(job) => {
                info!(job_id = %job_id, client_id = %client, "job started");
                Ok(job)
            }
            None => Err(self.explain_miss(job_id, JobOperation::Start, Party::Client(client))?),
        }
    }

    /// The assigned worker gives the job back; it returns to the open pool.
    pub fn release_by_worker(
        &self,
        worker: &WorkerId,
        job_id: &JobId,
    ) -> Result<Job, JobServiceError> {
        let predicate = JobMatch::for_operation(JobOperation::ReleaseByWorker).held_by(worker);

        match self
            .repository
            .update_where(job_id, &predicate, &JobUpdate::Release)?
        {
            Some(job) => {
                info!(job_id = %job_id, worker_id = %worker, "job released by worker");
                Ok(job)
            }
            None => Err(self.explain_miss(
                job_id,
                JobOperation::ReleaseByWorker,
                Party::Worker(worker),
            )?),
        }
    }

    /// Hard-delete a job that has not started. The image is released best-effort.
    pub async fn cancel_by_client(
        &self,
        client: &ClientId,
        job_id: &JobId,
    ) -> Result<Job, JobServiceError> {
        let predicate = JobMatch::for_operation(JobOperation::CancelByClient).owned_by(client);

        let Some(removed) = self.repository.delete_where(job_id, &predicate)? else {
            return Err(self.explain_miss(
                job_id,
                JobOperation::CancelByClient,
                Party::Client(client),
            )?);
        };

        info!(job_id = %job_id, client_id = %client, "job cancelled by client");
        if let Some(image) = removed.image.as_ref() {
            if let Err(err) = self.media.delete(&image.handle).await {
                warn!(
                    job_id = %job_id,
                    handle = %image.handle,
                    error = %err,
                    "job image not released"
                );
            }
        }
        Ok(removed)
    }

    /// Fetch a job visible to the actor: its owner, its worker, or an admin.
    pub fn get(&self, actor: &Actor, job_id: &JobId) -> Result<Job, JobServiceError> {
        let job = self
            .repository
            .fetch(job_id)?
            .ok_or(JobServiceError::NotFound)?;

        let visible = match actor {
            Actor::Client(client) => job.is_owned_by(client),
            Actor::Worker(worker) => job.is_held_by(worker),
            Actor::Admin(_) => true,
        };
        if visible {
            Ok(job)
        } else {
            Err(JobServiceError::Forbidden)
        }
    }

    /// Jobs a client posted, or jobs a worker holds or has finished.
    pub fn list_mine(&self, actor: &Actor) -> Result<Vec<Job>, JobServiceError> {
        let jobs = match actor {
            Actor::Client(client) => self.repository.for_client(client)?,
            Actor::Worker(worker) => self.repository.for_worker(worker)?,
            Actor::Admin(_) => self.repository.all()?,
        };
        Ok(jobs)
    }

    /// Re-read a job after a conditional write matched nothing and name the reason.
    pub(crate) fn explain_miss(
        &self,
        job_id: &JobId,
        operation: JobOperation,
        party: Party<'_>,
    ) -> Result<JobServiceError, RepositoryError> {
        let Some(job) = self.repository.fetch(job_id)? else {
            return Ok(JobServiceError::NotFound);
        };

        // An unheld job is a state failure for worker operations, not an ownership one.
        let authorized = match party {
            Party::Client(client) => job.is_owned_by(client),
            Party::Worker(worker) => job.worker_id.is_none() || job.is_held_by(worker),
        };
        if !authorized {
            return Ok(JobServiceError::Forbidden);
        }

        Ok(match operation.check(job.status) {
            Err(err) => JobServiceError::InvalidState(err),
            Ok(()) => JobServiceError::Conflict,
        })
    }
}

/// Error raised by the job lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("job not found")]
    NotFound,
    #[error("worker profile not found")]
    WorkerNotFound,
    #[error("you are not a party to this job")]
    Forbidden,
    #[error("job was already taken by another worker")]
    Conflict,
    #[error("job is no longer available")]
    NoLongerAvailable,
    #[error(transparent)]
    InvalidState(#[from] TransitionError),
    #[error("worker skills do not include the job's required skill")]
    SkillMismatch,
    #[error("worker already has an assigned or active job")]
    ActiveJobExists,
    #[error("completion code does not match")]
    InvalidCompletionCode,
    #[error("no completion code has been generated for this job")]
    CompletionCodeMissing,
    #[error("claim rollback failed; job needs manual correction")]
    RollbackFailed,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

impl From<IntakeViolation> for JobServiceError {
    fn from(value: IntakeViolation) -> Self {
        Self::Validation(value.to_string())
    }
}

impl JobServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            JobServiceError::Validation(_)
            | JobServiceError::NoLongerAvailable
            | JobServiceError::InvalidState(_)
            | JobServiceError::SkillMismatch
            | JobServiceError::ActiveJobExists
            | JobServiceError::InvalidCompletionCode
            | JobServiceError::CompletionCodeMissing => StatusCode::BAD_REQUEST,
            JobServiceError::NotFound | JobServiceError::WorkerNotFound => StatusCode::NOT_FOUND,
            JobServiceError::Forbidden => StatusCode::FORBIDDEN,
            JobServiceError::Conflict => StatusCode::CONFLICT,
            JobServiceError::Directory(_) | JobServiceError::Media(_) => StatusCode::BAD_GATEWAY,
            JobServiceError::RollbackFailed | JobServiceError::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            JobServiceError::Validation(_) => "VALIDATION_ERROR",
            JobServiceError::NotFound | JobServiceError::WorkerNotFound => "NOT_FOUND",
            JobServiceError::Forbidden => "FORBIDDEN",
            JobServiceError::Conflict => "CONFLICT",
            JobServiceError::NoLongerAvailable | JobServiceError::InvalidState(_) => {
                "INVALID_STATE"
            }
            JobServiceError::SkillMismatch => "SKILL_MISMATCH",
            JobServiceError::ActiveJobExists => "ACTIVE_JOB_EXISTS",
            JobServiceError::InvalidCompletionCode => "INVALID_OTP",
            JobServiceError::CompletionCodeMissing => "OTP_NOT_GENERATED",
            JobServiceError::RollbackFailed => "ROLLBACK_FAILED",
            JobServiceError::Directory(_) | JobServiceError::Media(_) => "UPSTREAM_FAILURE",
            JobServiceError::Repository(_) => "INTERNAL",
        }
    }

    /// Message safe to show callers; storage internals are never echoed.
    pub fn public_message(&self) -> String {
        match self {
            JobServiceError::Repository(_) => "internal error".to_string(),
            JobServiceError::Directory(_) => "identity service unavailable".to_string(),
            JobServiceError::Media(_) => "media service unavailable".to_string(),
            other => other.to_string(),
        }
    }
}
