use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    validate_submission, Review, ReviewDirection, ReviewSubmission, ReviewViolation,
};
use super::repository::{ReviewRepository, ReviewStoreError};
use crate::workflows::identity::{IdentityDirectory, RatedParty};
use crate::workflows::jobs::domain::{ClientId, Job, JobId, JobStatus, WorkerId};
use crate::workflows::jobs::repository::{JobRepository, RepositoryError};

/// Records ratings once a job is completed. Jobs are only read here, never written.
pub struct ReviewService<J, V, D> {
    jobs: Arc<J>,
    reviews: Arc<V>,
    directory: Arc<D>,
}

impl<J, V, D> ReviewService<J, V, D>
where
    J: JobRepository + 'static,
    V: ReviewRepository + 'static,
    D: IdentityDirectory + 'static,
{
    pub fn new(jobs: Arc<J>, reviews: Arc<V>, directory: Arc<D>) -> Self {
        Self {
            jobs,
            reviews,
            directory,
        }
    }

    /// The owning client rates the worker who completed the job.
    pub fn rate_worker(
        &self,
        client: &ClientId,
        job_id: &JobId,
        submission: &ReviewSubmission,
    ) -> Result<Review, ReviewError> {
        let (rating, note) = validate_submission(submission)?;
        let job = self.completed_job(job_id, |job| job.is_owned_by(client))?;
        let worker = job.worker_id.clone().ok_or(ReviewError::NotCompleted)?;

        let review = self.record(Review {
            job_id: job.id.clone(),
            direction: ReviewDirection::ClientToWorker,
            client_id: job.client_id.clone(),
            worker_id: worker.clone(),
            rating,
            note,
            created_at: Utc::now(),
        })?;
        self.fold_rating(&RatedParty::Worker(worker), &review);
        Ok(review)
    }

    /// The assigned worker rates the client who posted the job.
    pub fn rate_client(
        &self,
        worker: &WorkerId,
        job_id: &JobId,
        submission: &ReviewSubmission,
    ) -> Result<Review, ReviewError> {
        let (rating, note) = validate_submission(submission)?;
        let job = self.completed_job(job_id, |job| job.is_held_by(worker))?;

        let review = self.record(Review {
            job_id: job.id.clone(),
            direction: ReviewDirection::WorkerToClient,
            client_id: job.client_id.clone(),
            worker_id: worker.clone(),
            rating,
            note,
            created_at: Utc::now(),
        })?;
        self.fold_rating(&RatedParty::Client(job.client_id.clone()), &review);
        Ok(review)
    }

    pub fn all(&self) -> Result<Vec<Review>, ReviewError> {
        Ok(self.reviews.all()?)
    }

    fn completed_job<F>(&self, job_id: &JobId, is_party: F) -> Result<Job, ReviewError>
    where
        F: FnOnce(&Job) -> bool,
    {
        let job = self.jobs.fetch(job_id)?.ok_or(ReviewError::JobNotFound)?;
        if !is_party(&job) {
            return Err(ReviewError::NotParty);
        }
        if job.status != JobStatus::Completed {
            return Err(ReviewError::NotCompleted);
        }
        Ok(job)
    }

    fn record(&self, review: Review) -> Result<Review, ReviewError> {
        if self.reviews.find(&review.job_id, review.direction)?.is_some() {
            return Err(ReviewError::AlreadyReviewed);
        }
        let stored = match self.reviews.insert_unique(review) {
            Ok(stored) => stored,
            Err(ReviewStoreError::Duplicate) => return Err(ReviewError::AlreadyReviewed),
            Err(other) => return Err(other.into()),
        };
        info!(
            job_id = %stored.job_id,
            direction = stored.direction.label(),
            rating = stored.rating,
            "review recorded"
        );
        Ok(stored)
    }

    fn fold_rating(&self, party: &RatedParty, review: &Review) {
        if let Err(err) = self.directory.record_rating(party, review.rating) {
            warn!(
                job_id = %review.job_id,
                direction = review.direction.label(),
                error = %err,
                "rating aggregate not updated"
            );
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    Validation(#[from] ReviewViolation),
    #[error("job not found")]
    JobNotFound,
    #[error("you are not a party to this job")]
    NotParty,
    #[error("only completed jobs can be rated")]
    NotCompleted,
    #[error("this job has already been rated")]
    AlreadyReviewed,
    #[error(transparent)]
    Jobs(#[from] RepositoryError),
    #[error(transparent)]
    Store(#[from] ReviewStoreError),
}

impl ReviewError {
    pub fn status(&self) -> StatusCode {
        match self {
            ReviewError::Validation(_) | ReviewError::NotCompleted => StatusCode::BAD_REQUEST,
            ReviewError::JobNotFound => StatusCode::NOT_FOUND,
            ReviewError::NotParty => StatusCode::FORBIDDEN,
            ReviewError::AlreadyReviewed => StatusCode::CONFLICT,
            ReviewError::Jobs(_) | ReviewError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ReviewError::Validation(_) => "VALIDATION_ERROR",
            ReviewError::JobNotFound => "NOT_FOUND",
            ReviewError::NotParty => "FORBIDDEN",
            ReviewError::NotCompleted => "INVALID_STATE",
            ReviewError::AlreadyReviewed => "CONFLICT",
            ReviewError::Jobs(_) | ReviewError::Store(_) => "INTERNAL",
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            ReviewError::Jobs(_) | ReviewError::Store(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}
