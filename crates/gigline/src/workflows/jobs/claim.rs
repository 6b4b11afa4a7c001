//! Claim protocol: a worker takes a posted job.
//!
//! 1. Load the worker profile and refuse workers that already hold a job. This pre-check is
//!    not atomic with the claim.
//! 2. Claim with one conditional write matching `status = posted`, no worker, and a job skill
//!    contained in the worker's skill set.
//! 3. On a miss, re-read the job: gone is `NotFound`, taken is `Conflict`, any other
//!    non-posted status is `NoLongerAvailable`, and a posted job whose skill the worker lacks
//!    is `SkillMismatch`.
//! 4. After a hit, verify the worker again (still exists, still has the skill, holds nothing
//!    else). A failure triggers a compensating release that only applies while the job is
//!    still assigned to this worker, so it can never undo somebody else's claim.

use chrono::Utc;
use tracing::{error, info, warn};

use super::domain::{Job, JobId, JobStatus, WorkerId};
use super::lifecycle::{JobMatch, JobOperation, JobUpdate};
use super::repository::JobRepository;
use super::service::{JobLifecycleService, JobServiceError};
use crate::integrations::media::MediaStore;
use crate::workflows::identity::{IdentityDirectory, WorkerProfile};

impl<R, D, M> JobLifecycleService<R, D, M>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    /// Atomically assign a posted job to the worker.
    pub fn accept(&self, worker_id: &WorkerId, job_id: &JobId) -> Result<Job, JobServiceError> {
        let worker = self
            .directory
            .find_worker(worker_id)?
            .ok_or(JobServiceError::WorkerNotFound)?;

        if !self.repository.held_by_worker(worker_id)?.is_empty() {
            return Err(JobServiceError::ActiveJobExists);
        }

        let predicate = JobMatch::for_operation(JobOperation::Claim)
            .vacant()
            .skill_within(&worker.skills);
        let update = JobUpdate::Claim {
            worker: worker_id.clone(),
            at: Utc::now(),
        };

        let Some(claimed) = self.repository.update_where(job_id, &predicate, &update)? else {
            return Err(self.explain_lost_claim(job_id, &worker)?);
        };

        if let Some(violation) = self.post_claim_violation(&claimed, worker_id) {
            return Err(self.roll_back_claim(job_id, worker_id, violation));
        }

        info!(job_id = %job_id, worker_id = %worker_id, "job claimed");
        Ok(claimed)
    }

    fn explain_lost_claim(
        &self,
        job_id: &JobId,
        worker: &WorkerProfile,
    ) -> Result<JobServiceError, JobServiceError> {
        let Some(current) = self.repository.fetch(job_id)? else {
            return Ok(JobServiceError::NotFound);
        };

        if current.worker_id.is_some() {
            return Ok(JobServiceError::Conflict);
        }
        if current.status != JobStatus::Posted {
            return Ok(JobServiceError::NoLongerAvailable);
        }
        if !worker.has_skill(&current.skill) {
            return Ok(JobServiceError::SkillMismatch);
        }
        // Posted, vacant and matching now: it changed hands between our write and this read.
        Ok(JobServiceError::Conflict)
    }

    /// Guards that are only checked once the claim has landed.
    fn post_claim_violation(&self, claimed: &Job, worker_id: &WorkerId) -> Option<JobServiceError> {
        let worker = match self.directory.find_worker(worker_id) {
            Ok(Some(worker)) => worker,
            Ok(None) => return Some(JobServiceError::WorkerNotFound),
            Err(err) => return Some(JobServiceError::Directory(err)),
        };

        if !worker.has_skill(&claimed.skill) {
            return Some(JobServiceError::SkillMismatch);
        }

        match self.repository.held_by_worker(worker_id) {
            Ok(held) if held.iter().any(|job| job.id != claimed.id) => {
                Some(JobServiceError::ActiveJobExists)
            }
            Ok(_) => None,
            Err(err) => Some(JobServiceError::Repository(err)),
        }
    }

    /// Compensating release of a claim whose post-checks failed. Best-effort: a failed
    /// write is logged for manual correction and reported, never retried.
    fn roll_back_claim(
        &self,
        job_id: &JobId,
        worker_id: &WorkerId,
        violation: JobServiceError,
    ) -> JobServiceError {
        let predicate = JobMatch::in_statuses(&[JobStatus::Assigned]).held_by(worker_id);

        match self
            .repository
            .update_where(job_id, &predicate, &JobUpdate::Release)
        {
            Ok(Some(_)) => {
                warn!(
                    job_id = %job_id,
                    worker_id = %worker_id,
                    reason = %violation,
                    "claim rolled back"
                );
                violation
            }
            Ok(None) => {
                warn!(
                    job_id = %job_id,
                    worker_id = %worker_id,
                    reason = %violation,
                    "claim rollback found the job already moved on"
                );
                violation
            }
            Err(err) => {
                error!(
                    job_id = %job_id,
                    worker_id = %worker_id,
                    reason = %violation,
                    error = %err,
                    "claim rollback failed; job left assigned"
                );
                JobServiceError::RollbackFailed
            }
        }
    }
}
