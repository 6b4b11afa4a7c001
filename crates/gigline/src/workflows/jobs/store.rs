use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{ClientId, Job, JobId, JobStatus, WorkerId};
use super::lifecycle::{JobMatch, JobUpdate};
use super::repository::{JobRepository, RepositoryError};

/// Process-local job store. One mutex guards the whole map, so predicate evaluation and
/// mutation in `update_where`/`delete_where` happen under the same critical section.
#[derive(Default, Clone)]
pub struct InMemoryJobStore {
    records: Arc<Mutex<HashMap<JobId, Job>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<JobId, Job>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("job store mutex poisoned".to_string()))
    }

    fn collect<F>(&self, mut filter: F) -> Result<Vec<Job>, RepositoryError>
    where
        F: FnMut(&Job) -> bool,
    {
        let guard = self.lock()?;
        let mut jobs: Vec<Job> = guard.values().filter(|job| filter(job)).cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(jobs)
    }
}

impl JobRepository for InMemoryJobStore {
    fn insert(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&job.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn fetch(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.get(id).cloned())
    }

    fn update_where(
        &self,
        id: &JobId,
        predicate: &JobMatch,
        update: &JobUpdate,
    ) -> Result<Option<Job>, RepositoryError> {
        let mut guard = self.lock()?;
        match guard.get_mut(id) {
            Some(job) if predicate.matches(job) => {
                update.apply(job);
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    fn delete_where(
        &self,
        id: &JobId,
        predicate: &JobMatch,
    ) -> Result<Option<Job>, RepositoryError> {
        let mut guard = self.lock()?;
        let matched = guard.get(id).is_some_and(|job| predicate.matches(job));
        if matched {
            Ok(guard.remove(id))
        } else {
            Ok(None)
        }
    }

    fn held_by_worker(&self, worker: &WorkerId) -> Result<Vec<Job>, RepositoryError> {
        self.collect(|job| job.status.is_held() && job.is_held_by(worker))
    }

    fn for_worker(&self, worker: &WorkerId) -> Result<Vec<Job>, RepositoryError> {
        self.collect(|job| job.is_held_by(worker))
    }

    fn for_client(&self, client: &ClientId) -> Result<Vec<Job>, RepositoryError> {
        self.collect(|job| job.is_owned_by(client))
    }

    fn open_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        self.collect(|job| job.status == JobStatus::Posted)
    }

    fn all(&self) -> Result<Vec<Job>, RepositoryError> {
        self.collect(|_| true)
    }
}
