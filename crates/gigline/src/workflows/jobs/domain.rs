use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::completion::CompletionCode;
use crate::integrations::media::MediaAsset;

/// Identifier wrapper for posted jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Identifier of the client account that posts and owns jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub String);

/// Identifier of the worker account that claims jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Where the work happens. At least one of the two parts is present on a stored job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLocation {
    pub city: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
}

impl Urgency {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "normal" | "false" => Some(Self::Normal),
            "urgent" | "true" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

/// Lifecycle position of a job. Cancellation is a hard delete, not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Posted,
    Assigned,
    Active,
    Completed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Posted,
        JobStatus::Assigned,
        JobStatus::Active,
        JobStatus::Completed,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Posted => "posted",
            JobStatus::Assigned => "assigned",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
        }
    }

    /// Statuses in which a worker is considered to be holding the job.
    pub const fn is_held(self) -> bool {
        matches!(self, JobStatus::Assigned | JobStatus::Active)
    }

    /// Statuses that carry a worker reference.
    pub const fn requires_worker(self) -> bool {
        !matches!(self, JobStatus::Posted)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Stored job document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub client_id: ClientId,
    pub worker_id: Option<WorkerId>,
    pub title: String,
    pub description: String,
    pub skill: String,
    pub urgency: Urgency,
    pub location: JobLocation,
    pub status: JobStatus,
    pub image: Option<MediaAsset>,
    pub completion_otp: Option<CompletionCode>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_owned_by(&self, client: &ClientId) -> bool {
        &self.client_id == client
    }

    pub fn is_held_by(&self, worker: &WorkerId) -> bool {
        self.worker_id.as_ref() == Some(worker)
    }

    /// Checks the worker/status and completion-code invariants of a stored job.
    pub fn is_consistent(&self) -> bool {
        let worker_ok = self.worker_id.is_some() == self.status.requires_worker();
        let code_ok = self.completion_otp.is_none() || self.status == JobStatus::Active;
        worker_ok && code_ok
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            client_id: self.client_id.clone(),
            worker_id: self.worker_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            skill: self.skill.clone(),
            urgency: self.urgency,
            city: self.location.city.clone(),
            coordinates: self.location.coordinates,
            status: self.status,
            image_url: self.image.as_ref().map(|image| image.url.clone()),
            payment_status: self.payment_status,
            created_at: self.created_at,
            assigned_at: self.assigned_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Public representation of a job. Never carries the completion code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub client_id: ClientId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    pub title: String,
    pub description: String,
    pub skill: String,
    pub urgency: Urgency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Raw client input for a new job, before intake validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobSubmission {
    pub title: String,
    pub description: String,
    pub skill: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Case-insensitive comparison used for every skill tag check.
pub fn skill_matches(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}
