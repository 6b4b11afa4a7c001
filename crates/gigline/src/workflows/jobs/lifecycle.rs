//! Job state machine: which operation may run from which status, and the conditional
//! writes that carry each transition out against the store.
//!
//! Every mutation of a stored job is expressed as a [`JobMatch`] predicate paired with a
//! [`JobUpdate`]. Repositories evaluate the predicate and apply the update as one indivisible
//! step, so two requests racing on the same job can never both observe the old state.

use chrono::{DateTime, Utc};

use super::completion::CompletionCode;
use super::domain::{skill_matches, ClientId, Job, JobStatus, WorkerId};
use crate::access::ActorRole;

/// Operations that move a job through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobOperation {
    Claim,
    Start,
    ReleaseByWorker,
    CancelByClient,
    IssueCompletionCode,
    Complete,
}

impl JobOperation {
    pub const ALL: [JobOperation; 6] = [
        JobOperation::Claim,
        JobOperation::Start,
        JobOperation::ReleaseByWorker,
        JobOperation::CancelByClient,
        JobOperation::IssueCompletionCode,
        JobOperation::Complete,
    ];

    pub const fn allowed_from(self) -> &'static [JobStatus] {
        match self {
            JobOperation::Claim => &[JobStatus::Posted],
            JobOperation::Start => &[JobStatus::Assigned],
            JobOperation::ReleaseByWorker => &[JobStatus::Assigned, JobStatus::Active],
            JobOperation::CancelByClient => &[JobStatus::Posted, JobStatus::Assigned],
            JobOperation::IssueCompletionCode => &[JobStatus::Active],
            JobOperation::Complete => &[JobStatus::Active],
        }
    }

    /// Status after the operation; `None` when the job is removed.
    pub const fn next_status(self) -> Option<JobStatus> {
        match self {
            JobOperation::Claim => Some(JobStatus::Assigned),
            JobOperation::Start => Some(JobStatus::Active),
            JobOperation::ReleaseByWorker => Some(JobStatus::Posted),
            JobOperation::CancelByClient => None,
            JobOperation::IssueCompletionCode => Some(JobStatus::Active),
            JobOperation::Complete => Some(JobStatus::Completed),
        }
    }

    pub const fn actor(self) -> ActorRole {
        match self {
            JobOperation::Claim
            | JobOperation::ReleaseByWorker
            | JobOperation::IssueCompletionCode => ActorRole::Worker,
            JobOperation::Start | JobOperation::CancelByClient | JobOperation::Complete => {
                ActorRole::Client
            }
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            JobOperation::Claim => "accept",
            JobOperation::Start => "start",
            JobOperation::ReleaseByWorker => "release",
            JobOperation::CancelByClient => "cancel",
            JobOperation::IssueCompletionCode => "generate a completion code for",
            JobOperation::Complete => "complete",
        }
    }

    pub fn permits(self, status: JobStatus) -> bool {
        self.allowed_from().contains(&status)
    }

    pub fn check(self, status: JobStatus) -> Result<(), TransitionError> {
        if self.permits(status) {
            Ok(())
        } else {
            Err(TransitionError {
                operation: self,
                status,
            })
        }
    }
}

impl std::fmt::Display for JobOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Raised when an operation is attempted from a status the table does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {operation} a job that is {status}")]
pub struct TransitionError {
    pub operation: JobOperation,
    pub status: JobStatus,
}

/// Constraint on the worker reference of the stored job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSlot {
    Any,
    Vacant,
    HeldBy(WorkerId),
}

/// Predicate a stored job must satisfy for a conditional write to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct JobMatch {
    pub statuses: &'static [JobStatus],
    pub client: Option<ClientId>,
    pub worker: WorkerSlot,
    pub skill_in: Option<Vec<String>>,
    pub completion_code: Option<String>,
}

impl JobMatch {
    pub fn for_operation(operation: JobOperation) -> Self {
        Self::in_statuses(operation.allowed_from())
    }

    pub fn in_statuses(statuses: &'static [JobStatus]) -> Self {
        Self {
            statuses,
            client: None,
            worker: WorkerSlot::Any,
            skill_in: None,
            completion_code: None,
        }
    }

    pub fn owned_by(mut self, client: &ClientId) -> Self {
        self.client = Some(client.clone());
        self
    }

    pub fn vacant(mut self) -> Self {
        self.worker = WorkerSlot::Vacant;
        self
    }

    pub fn held_by(mut self, worker: &WorkerId) -> Self {
        self.worker = WorkerSlot::HeldBy(worker.clone());
        self
    }

    pub fn skill_within(mut self, skills: &[String]) -> Self {
        self.skill_in = Some(skills.to_vec());
        self
    }

    pub fn with_completion_code(mut self, code: &str) -> Self {
        self.completion_code = Some(code.to_string());
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        if !self.statuses.contains(&job.status) {
            return false;
        }

        if let Some(client) = &self.client {
            if &job.client_id != client {
                return false;
            }
        }

        let worker_ok = match &self.worker {
            WorkerSlot::Any => true,
            WorkerSlot::Vacant => job.worker_id.is_none(),
            WorkerSlot::HeldBy(worker) => job.worker_id.as_ref() == Some(worker),
        };
        if !worker_ok {
            return false;
        }

        if let Some(skills) = &self.skill_in {
            if !skills.iter().any(|skill| skill_matches(skill, &job.skill)) {
                return false;
            }
        }

        match (&self.completion_code, &job.completion_otp) {
            (None, _) => true,
            (Some(expected), Some(stored)) => stored.as_str() == expected,
            (Some(_), None) => false,
        }
    }
}

/// Mutation applied to a job once its [`JobMatch`] holds.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Claim { worker: WorkerId, at: DateTime<Utc> },
    Start { at: DateTime<Utc> },
    Release,
    IssueCompletionCode(CompletionCode),
    Complete { at: DateTime<Utc> },
}

impl JobUpdate {
    pub fn apply(&self, job: &mut Job) {
        match self {
            JobUpdate::Claim { worker, at } => {
                job.worker_id = Some(worker.clone());
                job.status = JobStatus::Assigned;
                job.assigned_at = Some(*at);
                job.completion_otp = None;
            }
            JobUpdate::Start { at } => {
                job.status = JobStatus::Active;
                job.started_at = Some(*at);
            }
            JobUpdate::Release => {
                job.worker_id = None;
                job.status = JobStatus::Posted;
                job.assigned_at = None;
                job.started_at = None;
                job.completion_otp = None;
            }
            JobUpdate::IssueCompletionCode(code) => {
                job.completion_otp = Some(code.clone());
            }
            JobUpdate::Complete { at } => {
                job.status = JobStatus::Completed;
                job.completed_at = Some(*at);
                job.completion_otp = None;
            }
        }
    }
}
