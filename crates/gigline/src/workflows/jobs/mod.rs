//! Job lifecycle engine: posting, browsing, the atomic claim, the completion-code gate, and
//! cancellation. Every state change is a single conditional write against the repository.

pub mod browse;
mod claim;
pub mod completion;
pub mod domain;
pub(crate) mod intake;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use browse::{AvailableJob, AvailableJobsPage, AvailableJobsQuery, SkillFilter};
pub use completion::{CompletionCode, CompletionCodeSource, RandomCompletionCodes};
pub use domain::{
    ClientId, Coordinates, Job, JobId, JobLocation, JobStatus, JobSubmission, JobSummary,
    PaymentStatus, Urgency, WorkerId,
};
pub use intake::IntakeViolation;
pub use lifecycle::{JobMatch, JobOperation, JobUpdate, TransitionError};
pub use repository::{JobRepository, RepositoryError};
pub use router::{job_router, JobApiError};
pub use service::{JobLifecycleService, JobServiceError};
pub use store::InMemoryJobStore;
