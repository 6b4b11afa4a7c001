use super::domain::{ClientId, Job, JobId, WorkerId};
use super::lifecycle::{JobMatch, JobUpdate};

/// Storage abstraction for job documents.
///
/// `update_where` and `delete_where` are the only mutation paths. Implementations must
/// evaluate the predicate and apply the change as a single atomic step (a row-level
/// `UPDATE ... WHERE` or a find-and-modify on one document) and report `Ok(None)` when no
/// stored job matched.
pub trait JobRepository: Send + Sync {
    fn insert(&self, job: Job) -> Result<Job, RepositoryError>;
    fn fetch(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    fn update_where(
        &self,
        id: &JobId,
        predicate: &JobMatch,
        update: &JobUpdate,
    ) -> Result<Option<Job>, RepositoryError>;
    fn delete_where(&self, id: &JobId, predicate: &JobMatch)
        -> Result<Option<Job>, RepositoryError>;
    /// Jobs the worker currently holds in assigned or active state.
    fn held_by_worker(&self, worker: &WorkerId) -> Result<Vec<Job>, RepositoryError>;
    /// Jobs the worker holds or has completed.
    fn for_worker(&self, worker: &WorkerId) -> Result<Vec<Job>, RepositoryError>;
    fn for_client(&self, client: &ClientId) -> Result<Vec<Job>, RepositoryError>;
    /// Every job still open for claims.
    fn open_jobs(&self) -> Result<Vec<Job>, RepositoryError>;
    fn all(&self) -> Result<Vec<Job>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
