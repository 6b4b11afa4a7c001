use std::cmp::Ordering;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::domain::{Job, JobSummary, Urgency, WorkerId};
use super::repository::JobRepository;
use super::service::{JobLifecycleService, JobServiceError};
use crate::integrations::media::MediaStore;
use crate::workflows::identity::{IdentityDirectory, WorkerProfile};

pub const DEFAULT_MAX_DISTANCE_KM: f64 = 25.0;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

const FOR_YOU: &str = "for you";
const ALL_SERVICES: &str = "all services";

/// Query accepted by `GET /jobs/available`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableJobsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub skill: Option<String>,
    pub max_distance: Option<f64>,
    pub urgency: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillFilter {
    All,
    ForYou,
    Tag(String),
}

impl SkillFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => SkillFilter::All,
            Some(value) if value.eq_ignore_ascii_case(ALL_SERVICES) => SkillFilter::All,
            Some(value) if value.eq_ignore_ascii_case(FOR_YOU) => SkillFilter::ForYou,
            Some(value) => SkillFilter::Tag(value.to_string()),
        }
    }

    fn admits(&self, job: &Job, worker: &WorkerProfile) -> bool {
        match self {
            SkillFilter::All => true,
            SkillFilter::ForYou => worker.has_skill(&job.skill),
            SkillFilter::Tag(tag) => super::domain::skill_matches(tag, &job.skill),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Recent,
    Distance,
}

impl SortOrder {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("distance") => SortOrder::Distance,
            _ => SortOrder::Recent,
        }
    }
}

/// A posted job annotated with its distance from the browsing worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableJob {
    #[serde(flatten)]
    pub job: JobSummary,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableJobsPage {
    pub jobs: Vec<AvailableJob>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: usize,
    pub worker_skills: Vec<String>,
}

impl<R, D, M> JobLifecycleService<R, D, M>
where
    R: JobRepository + 'static,
    D: IdentityDirectory + 'static,
    M: MediaStore + 'static,
{
    /// List posted jobs for a worker with skill, urgency, and distance filters.
    pub async fn available(
        &self,
        worker_id: &WorkerId,
        query: AvailableJobsQuery,
    ) -> Result<AvailableJobsPage, JobServiceError> {
        let worker = self
            .directory
            .find_worker(worker_id)?
            .ok_or(JobServiceError::WorkerNotFound)?;

        let skill_filter = SkillFilter::parse(query.skill.as_deref());
        let urgency = match query.urgency.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(Urgency::parse(raw).ok_or_else(|| {
                JobServiceError::Validation(format!("unknown urgency filter '{raw}'"))
            })?),
        };
        let max_distance = match query.max_distance {
            Some(km) if !km.is_finite() || km < 0.0 => {
                return Err(JobServiceError::Validation(
                    "maxDistance must be a non-negative number".to_string(),
                ));
            }
            Some(km) => km,
            None => DEFAULT_MAX_DISTANCE_KM,
        };
        let sort = SortOrder::parse(query.sort_by.as_deref());
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let candidates: Vec<Job> = self
            .repository
            .open_jobs()?
            .into_iter()
            .filter(|job| skill_filter.admits(job, &worker))
            .filter(|job| urgency.map_or(true, |wanted| job.urgency == wanted))
            .collect();

        let lookups = candidates.iter().map(|job| async {
            match (worker.location, job.location.coordinates) {
                (Some(from), Some(to)) => Some(self.distance.distance_km(from, to).await),
                _ => None,
            }
        });
        let distances = join_all(lookups).await;

        let mut annotated: Vec<(Job, Option<f64>)> = candidates
            .into_iter()
            .zip(distances)
            .filter(|(_, distance)| !distance.is_some_and(|km| km > max_distance))
            .collect();

        match sort {
            SortOrder::Recent => {
                annotated.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at));
            }
            SortOrder::Distance => annotated.sort_by(|(a, da), (b, db)| {
                compare_distance(*da, *db).then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }

        let total = annotated.len();
        let total_pages = total.div_ceil(limit as usize);
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let jobs = annotated
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .map(|(job, distance)| AvailableJob {
                job: job.summary(),
                distance,
            })
            .collect();

        Ok(AvailableJobsPage {
            jobs,
            page,
            limit,
            total,
            total_pages,
            worker_skills: worker.skills,
        })
    }
}

/// Known distances first, nearest first.
fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
