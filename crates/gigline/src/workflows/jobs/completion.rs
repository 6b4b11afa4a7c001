use std::fmt::Debug;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ClientId, Job, JobId, WorkerId};
use super::lifecycle::{JobMatch, JobOperation, JobUpdate};
use super::repository::{JobRepository, RepositoryError};
use super::service::{JobLifecycleService, JobServiceError, Party};
use crate::integrations::media::MediaStore;
use crate::workflows::identity::IdentityDirectory;

pub const COMPLETION_CODE_DIGITS: usize = 6;

/// Six-digit code the assigned worker hands to the client to confirm completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCode(String);

impl CompletionCode {
    /// Accepts exactly six ASCII digits.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == COMPLETION_CODE_DIGITS && raw.bytes().all(|b| b.is_ascii_digit());
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Source of fresh completion codes.
pub trait CompletionCodeSource: Send + Sync + Debug {
    fn next_code(&self) -> CompletionCode;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCompletionCodes;

impl CompletionCodeSource for RandomCompletionCodes {
    fn next_code(&self) -> CompletionCode {
        let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
        CompletionCode(format!("{value:06}"))
    }
}

impl<R, D, M> JobLifecycleService<R, D, M>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    /// Mint a new completion code for an active job, replacing any earlier one.
    pub fn issue_completion_code(
        &self,
        worker: &WorkerId,
        job_id: &JobId,
    ) -> Result<CompletionCode, JobServiceError> {
        let code = self.codes.next_code();
        let predicate = JobMatch::for_operation(JobOperation::IssueCompletionCode).held_by(worker);
        let update = JobUpdate::IssueCompletionCode(code.clone());

        match self.repository.update_where(job_id, &predicate, &update)? {
            Some(_) => {
                info!(job_id = %job_id, worker_id = %worker, "completion code issued");
                Ok(code)
            }
            None => Err(self.explain_miss(
                job_id,
                JobOperation::IssueCompletionCode,
                Party::Worker(worker),
            )?),
        }
    }

    /// Close an active job when the client presents the latest completion code.
    pub fn complete(
        &self,
        client: &ClientId,
        job_id: &JobId,
        code: &str,
    ) -> Result<Job, JobServiceError> {
        if code.trim().is_empty() {
            return Err(JobServiceError::Validation(
                "otp is required to complete a job".to_string(),
            ));
        }

        let predicate = JobMatch::for_operation(JobOperation::Complete)
            .owned_by(client)
            .with_completion_code(code);
        let update = JobUpdate::Complete { at: Utc::now() };

        let Some(job) = self.repository.update_where(job_id, &predicate, &update)? else {
            return Err(self.explain_completion_miss(client, job_id, code)?);
        };

        info!(job_id = %job_id, client_id = %client, "job completed");
        if let Some(worker) = job.worker_id.as_ref() {
            self.record_completion(worker, job_id);
        }
        Ok(job)
    }

    fn explain_completion_miss(
        &self,
        client: &ClientId,
        job_id: &JobId,
        code: &str,
    ) -> Result<JobServiceError, RepositoryError> {
        let Some(job) = self.repository.fetch(job_id)? else {
            return Ok(JobServiceError::NotFound);
        };
        if !job.is_owned_by(client) {
            return Ok(JobServiceError::Forbidden);
        }
        if let Err(err) = JobOperation::Complete.check(job.status) {
            return Ok(JobServiceError::InvalidState(err));
        }
        Ok(match job.completion_otp {
            None => JobServiceError::CompletionCodeMissing,
            Some(stored) if stored.as_str() != code => JobServiceError::InvalidCompletionCode,
            Some(_) => JobServiceError::Conflict,
        })
    }

    fn record_completion(&self, worker: &WorkerId, job_id: &JobId) {
        if let Err(err) = self.directory.record_completed_job(worker) {
            tracing::warn!(
                job_id = %job_id,
                worker_id = %worker,
                error = %err,
                "completed-job counter not updated"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_are_six_digits() {
        let source = RandomCompletionCodes;
        for _ in 0..200 {
            let code = source.next_code();
            assert_eq!(code.as_str().len(), COMPLETION_CODE_DIGITS);
            assert!(code.as_str().bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn parse_rejects_non_numeric_and_wrong_length() {
        assert!(CompletionCode::parse("482913").is_some());
        assert!(CompletionCode::parse("48291").is_none());
        assert!(CompletionCode::parse("4829130").is_none());
        assert!(CompletionCode::parse("48a913").is_none());
    }
}
