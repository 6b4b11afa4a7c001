use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{Review, ReviewDirection};
use crate::workflows::jobs::domain::JobId;

/// Storage abstraction for reviews. At most one review exists per job and direction;
/// `insert_unique` enforces that atomically.
pub trait ReviewRepository: Send + Sync {
    fn insert_unique(&self, review: Review) -> Result<Review, ReviewStoreError>;
    fn find(
        &self,
        job_id: &JobId,
        direction: ReviewDirection,
    ) -> Result<Option<Review>, ReviewStoreError>;
    fn all(&self) -> Result<Vec<Review>, ReviewStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewStoreError {
    #[error("review already recorded")]
    Duplicate,
    #[error("review store unavailable: {0}")]
    Unavailable(String),
}

type ReviewKey = (JobId, ReviewDirection);

#[derive(Default, Clone)]
pub struct InMemoryReviewStore {
    records: Arc<Mutex<HashMap<ReviewKey, Review>>>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ReviewKey, Review>>, ReviewStoreError> {
        self.records
            .lock()
            .map_err(|_| ReviewStoreError::Unavailable("review store mutex poisoned".to_string()))
    }
}

impl ReviewRepository for InMemoryReviewStore {
    fn insert_unique(&self, review: Review) -> Result<Review, ReviewStoreError> {
        let mut guard = self.lock()?;
        let key = (review.job_id.clone(), review.direction);
        if guard.contains_key(&key) {
            return Err(ReviewStoreError::Duplicate);
        }
        guard.insert(key, review.clone());
        Ok(review)
    }

    fn find(
        &self,
        job_id: &JobId,
        direction: ReviewDirection,
    ) -> Result<Option<Review>, ReviewStoreError> {
        Ok(self.lock()?.get(&(job_id.clone(), direction)).cloned())
    }

    fn all(&self) -> Result<Vec<Review>, ReviewStoreError> {
        let mut reviews: Vec<_> = self.lock()?.values().cloned().collect();
        reviews.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(reviews)
    }
}
