//! Job marketplace core: job lifecycle, atomic claims, completion codes, reviews, and the
//! collaborators they depend on.

pub mod access;
pub mod config;
pub mod error;
pub mod integrations;
pub mod telemetry;
pub mod workflows;
