//! Client and worker profiles as seen by the marketplace workflows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::workflows::jobs::domain::{skill_matches, ClientId, Coordinates, WorkerId};

/// Running rating aggregate kept on each profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub count: u32,
    pub total: u32,
}

impl RatingSummary {
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| f64::from(self.total) / f64::from(self.count))
    }

    fn record(&mut self, rating: u8) {
        self.count = self.count.saturating_add(1);
        self.total = self.total.saturating_add(u32::from(rating));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: WorkerId,
    pub name: String,
    pub skills: Vec<String>,
    pub location: Option<Coordinates>,
    pub completed_jobs: u32,
    pub rating: RatingSummary,
}

impl WorkerProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, skills: &[&str]) -> Self {
        Self {
            id: WorkerId(id.into()),
            name: name.into(),
            skills: skills.iter().map(|skill| skill.to_string()).collect(),
            location: None,
            completed_jobs: 0,
            rating: RatingSummary::default(),
        }
    }

    pub fn located_at(mut self, location: Coordinates) -> Self {
        self.location = Some(location);
        self
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|own| skill_matches(own, skill))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: ClientId,
    pub name: String,
    pub rating: RatingSummary,
}

impl ClientProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ClientId(id.into()),
            name: name.into(),
            rating: RatingSummary::default(),
        }
    }
}

/// Party whose aggregate receives a new rating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatedParty {
    Worker(WorkerId),
    Client(ClientId),
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("profile not found")]
    NotFound,
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

/// Identity store consumed by the job, review, and reporting workflows.
pub trait IdentityDirectory: Send + Sync {
    fn find_worker(&self, id: &WorkerId) -> Result<Option<WorkerProfile>, DirectoryError>;
    fn find_client(&self, id: &ClientId) -> Result<Option<ClientProfile>, DirectoryError>;
    /// Non-atomic increment; the counter is display-only.
    fn record_completed_job(&self, id: &WorkerId) -> Result<(), DirectoryError>;
    fn record_rating(&self, party: &RatedParty, rating: u8) -> Result<(), DirectoryError>;
}

#[derive(Default)]
struct Profiles {
    workers: HashMap<WorkerId, WorkerProfile>,
    clients: HashMap<ClientId, ClientProfile>,
}

#[derive(Default, Clone)]
pub struct InMemoryIdentityDirectory {
    profiles: Arc<Mutex<Profiles>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Profiles>, DirectoryError> {
        self.profiles
            .lock()
            .map_err(|_| DirectoryError::Unavailable("identity mutex poisoned".to_string()))
    }

    pub fn upsert_worker(&self, profile: WorkerProfile) -> Result<(), DirectoryError> {
        self.lock()?.workers.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn upsert_client(&self, profile: ClientProfile) -> Result<(), DirectoryError> {
        self.lock()?.clients.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn remove_worker(&self, id: &WorkerId) -> Result<Option<WorkerProfile>, DirectoryError> {
        Ok(self.lock()?.workers.remove(id))
    }

    pub fn workers(&self) -> Result<Vec<WorkerProfile>, DirectoryError> {
        let mut workers: Vec<_> = self.lock()?.workers.values().cloned().collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(workers)
    }
}

impl IdentityDirectory for InMemoryIdentityDirectory {
    fn find_worker(&self, id: &WorkerId) -> Result<Option<WorkerProfile>, DirectoryError> {
        Ok(self.lock()?.workers.get(id).cloned())
    }

    fn find_client(&self, id: &ClientId) -> Result<Option<ClientProfile>, DirectoryError> {
        Ok(self.lock()?.clients.get(id).cloned())
    }

    fn record_completed_job(&self, id: &WorkerId) -> Result<(), DirectoryError> {
        let mut guard = self.lock()?;
        let worker = guard.workers.get_mut(id).ok_or(DirectoryError::NotFound)?;
        worker.completed_jobs = worker.completed_jobs.saturating_add(1);
        Ok(())
    }

    fn record_rating(&self, party: &RatedParty, rating: u8) -> Result<(), DirectoryError> {
        let mut guard = self.lock()?;
        match party {
            RatedParty::Worker(id) => guard
                .workers
                .get_mut(id)
                .ok_or(DirectoryError::NotFound)?
                .rating
                .record(rating),
            RatedParty::Client(id) => guard
                .clients
                .get_mut(id)
                .ok_or(DirectoryError::NotFound)?
                .rating
                .record(rating),
        }
        Ok(())
    }
}
