use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::jobs::domain::{ClientId, JobId, WorkerId};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
pub const MAX_NOTE_CHARS: usize = 500;

/// Who is rating whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDirection {
    ClientToWorker,
    WorkerToClient,
}

impl ReviewDirection {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewDirection::ClientToWorker => "client_to_worker",
            ReviewDirection::WorkerToClient => "worker_to_client",
        }
    }
}

/// Immutable rating left after a job is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub job_id: JobId,
    pub direction: ReviewDirection,
    pub client_id: ClientId,
    pub worker_id: WorkerId,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for both rating endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReviewSubmission {
    pub rating: Option<i64>,
    #[serde(default)]
    pub review: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewViolation {
    #[error("rating is required")]
    MissingRating,
    #[error("rating must be between 1 and 5")]
    RatingOutOfRange,
    #[error("review must be at most 500 characters")]
    NoteTooLong,
    #[error("invalid review body: {0}")]
    Malformed(String),
}

/// Validated rating and trimmed note; blank notes are dropped.
pub fn validate_submission(
    submission: &ReviewSubmission,
) -> Result<(u8, Option<String>), ReviewViolation> {
    let rating = submission.rating.ok_or(ReviewViolation::MissingRating)?;
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ReviewViolation::RatingOutOfRange);
    }

    let note = submission
        .review
        .as_deref()
        .map(str::trim)
        .filter(|note| !note.is_empty());
    if note.is_some_and(|note| note.chars().count() > MAX_NOTE_CHARS) {
        return Err(ReviewViolation::NoteTooLong);
    }

    Ok((rating as u8, note.map(str::to_string)))
}
