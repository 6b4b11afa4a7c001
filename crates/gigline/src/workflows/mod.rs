pub mod identity;
pub mod jobs;
pub mod reporting;
pub mod reviews;
pub mod verification;
