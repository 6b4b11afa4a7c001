//! Ratings exchanged between client and worker once a job is completed.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{Review, ReviewDirection, ReviewSubmission, ReviewViolation};
pub use repository::{InMemoryReviewStore, ReviewRepository, ReviewStoreError};
pub use router::review_router;
pub use service::{ReviewError, ReviewService};
