//! Read-only aggregates for the admin dashboard.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::access::AuthenticatedActor;
use crate::workflows::jobs::domain::{Job, JobStatus, Urgency};
use crate::workflows::jobs::repository::{JobRepository, RepositoryError};
use crate::workflows::reviews::domain::{Review, ReviewDirection};
use crate::workflows::reviews::repository::{ReviewRepository, ReviewStoreError};

const TOP_SKILLS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: JobStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillDemand {
    pub skill: String,
    pub jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStats {
    pub direction: ReviewDirection,
    pub count: usize,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_jobs: usize,
    pub jobs_by_status: Vec<StatusCount>,
    pub urgent_open_jobs: usize,
    pub top_skills: Vec<SkillDemand>,
    pub reviews: Vec<ReviewStats>,
}

impl DashboardSummary {
    pub fn build(jobs: &[Job], reviews: &[Review]) -> Self {
        let jobs_by_status = JobStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: jobs.iter().filter(|job| job.status == status).count(),
            })
            .collect();

        let urgent_open_jobs = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Posted && job.urgency == Urgency::Urgent)
            .count();

        let mut demand: HashMap<String, usize> = HashMap::new();
        for job in jobs {
            *demand.entry(job.skill.trim().to_ascii_lowercase()).or_default() += 1;
        }
        let mut top_skills: Vec<SkillDemand> = demand
            .into_iter()
            .map(|(skill, jobs)| SkillDemand { skill, jobs })
            .collect();
        top_skills.sort_by(|a, b| b.jobs.cmp(&a.jobs).then_with(|| a.skill.cmp(&b.skill)));
        top_skills.truncate(TOP_SKILLS);

        let reviews = [ReviewDirection::ClientToWorker, ReviewDirection::WorkerToClient]
            .into_iter()
            .map(|direction| {
                let ratings: Vec<u32> = reviews
                    .iter()
                    .filter(|review| review.direction == direction)
                    .map(|review| u32::from(review.rating))
                    .collect();
                let average_rating = (!ratings.is_empty()).then(|| {
                    let total: u32 = ratings.iter().sum();
                    (f64::from(total) / ratings.len() as f64 * 100.0).round() / 100.0
                });
                ReviewStats {
                    direction,
                    count: ratings.len(),
                    average_rating,
                }
            })
            .collect();

        Self {
            total_jobs: jobs.len(),
            jobs_by_status,
            urgent_open_jobs,
            top_skills,
            reviews,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportingError {
    #[error(transparent)]
    Jobs(#[from] RepositoryError),
    #[error(transparent)]
    Reviews(#[from] ReviewStoreError),
}

pub struct ReportingService<J, V> {
    jobs: Arc<J>,
    reviews: Arc<V>,
}

impl<J, V> ReportingService<J, V>
where
    J: JobRepository + 'static,
    V: ReviewRepository + 'static,
{
    pub fn new(jobs: Arc<J>, reviews: Arc<V>) -> Self {
        Self { jobs, reviews }
    }

    pub fn summary(&self) -> Result<DashboardSummary, ReportingError> {
        let jobs = self.jobs.all()?;
        let reviews = self.reviews.all()?;
        Ok(DashboardSummary::build(&jobs, &reviews))
    }
}

pub fn reporting_router<J, V>(service: Arc<ReportingService<J, V>>) -> Router
where
    J: JobRepository + 'static,
    V: ReviewRepository + 'static,
{
    Router::new()
        .route("/admin/summary", get(summary_handler::<J, V>))
        .with_state(service)
}

async fn summary_handler<J, V>(
    State(service): State<Arc<ReportingService<J, V>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Response
where
    J: JobRepository + 'static,
    V: ReviewRepository + 'static,
{
    if let Err(err) = actor.require_admin() {
        return err.into_response();
    }
    match service.summary() {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => {
            error!(error = %err, "dashboard summary failed");
            let payload = json!({
                "error": "internal error",
                "code": "INTERNAL",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Extension;
    use axum::http::{header, Request};
    use chrono::Utc;
    use tower::ServiceExt;

    use crate::access::{Actor, InMemorySessions, SharedSessions};
    use crate::workflows::jobs::domain::{ClientId, JobId, JobLocation, PaymentStatus, WorkerId};
    use crate::workflows::jobs::store::InMemoryJobStore;
    use crate::workflows::reviews::repository::InMemoryReviewStore;

    fn job(id: &str, skill: &str, status: JobStatus, urgency: Urgency) -> Job {
        Job {
            id: JobId(id.to_string()),
            client_id: ClientId("client-1".to_string()),
            worker_id: status
                .requires_worker()
                .then(|| WorkerId("worker-1".to_string())),
            title: format!("{skill} visit"),
            description: "Routine visit".to_string(),
            skill: skill.to_string(),
            urgency,
            location: JobLocation {
                city: Some("Chennai".to_string()),
                coordinates: None,
            },
            status,
            image: None,
            completion_otp: None,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn review(job_id: &str, direction: ReviewDirection, rating: u8) -> Review {
        Review {
            job_id: JobId(job_id.to_string()),
            direction,
            client_id: ClientId("client-1".to_string()),
            worker_id: WorkerId("worker-1".to_string()),
            rating,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summary_counts_statuses_skills_and_ratings() {
        let jobs = vec![
            job("j1", "plumber", JobStatus::Posted, Urgency::Urgent),
            job("j2", "Plumber", JobStatus::Posted, Urgency::Normal),
            job("j3", "electrician", JobStatus::Completed, Urgency::Urgent),
            job("j4", "plumber", JobStatus::Completed, Urgency::Normal),
        ];
        let reviews = vec![
            review("j3", ReviewDirection::ClientToWorker, 5),
            review("j4", ReviewDirection::ClientToWorker, 4),
        ];

        let summary = DashboardSummary::build(&jobs, &reviews);

        assert_eq!(summary.total_jobs, 4);
        assert_eq!(summary.urgent_open_jobs, 1);
        assert_eq!(
            summary.jobs_by_status,
            vec![
                StatusCount { status: JobStatus::Posted, count: 2 },
                StatusCount { status: JobStatus::Assigned, count: 0 },
                StatusCount { status: JobStatus::Active, count: 0 },
                StatusCount { status: JobStatus::Completed, count: 2 },
            ]
        );
        assert_eq!(
            summary.top_skills[0],
            SkillDemand {
                skill: "plumber".to_string(),
                jobs: 3
            }
        );
        assert_eq!(summary.reviews[0].average_rating, Some(4.5));
        assert_eq!(summary.reviews[1].count, 0);
        assert_eq!(summary.reviews[1].average_rating, None);
    }

    #[tokio::test]
    async fn summary_route_is_admin_only() {
        let jobs = Arc::new(InMemoryJobStore::new());
        jobs.insert(job("j1", "painter", JobStatus::Posted, Urgency::Normal))
            .expect("seed job");
        let service = Arc::new(ReportingService::new(
            jobs,
            Arc::new(InMemoryReviewStore::new()),
        ));
        let sessions = InMemorySessions::new();
        sessions.insert("admin", Actor::Admin("ops".to_string()));
        sessions.insert("client", Actor::Client(ClientId("client-1".to_string())));
        let router =
            reporting_router(service).layer(Extension(Arc::new(sessions) as SharedSessions));

        let get_summary = |token: &str| {
            Request::get("/admin/summary")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .expect("request builds")
        };

        let denied = router
            .clone()
            .oneshot(get_summary("client"))
            .await
            .expect("route responds");
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let allowed = router
            .oneshot(get_summary("admin"))
            .await
            .expect("route responds");
        assert_eq!(allowed.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(allowed.into_body(), 16 * 1024)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json payload");
        assert_eq!(body["total_jobs"], 1);
        assert_eq!(body["top_skills"][0]["skill"], "painter");
    }
}
