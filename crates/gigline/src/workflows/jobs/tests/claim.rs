use std::sync::{Arc, Barrier};
use std::thread;

use axum::http::StatusCode;

use super::common::*;
use crate::integrations::distance::DistanceEstimator;
use crate::workflows::identity::WorkerProfile;
use crate::workflows::jobs::domain::{JobId, JobStatus};
use crate::workflows::jobs::lifecycle::{JobMatch, JobUpdate};
use crate::workflows::jobs::repository::JobRepository;
use crate::workflows::jobs::service::{JobLifecycleService, JobServiceError};
use crate::workflows::jobs::store::InMemoryJobStore;

#[tokio::test]
async fn concurrent_accepts_assign_exactly_one_worker() {
    const CONTENDERS: usize = 8;
    let harness = harness();
    for index in 0..CONTENDERS {
        harness
            .directory
            .upsert_worker(WorkerProfile::new(
                format!("racer-{index}"),
                format!("Racer {index}"),
                &["plumber"],
            ))
            .expect("seed worker");
    }
    let job = harness.post("plumber").await;

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..CONTENDERS)
            .map(|index| {
                let service = harness.service.clone();
                let barrier = barrier.clone();
                let job_id = job.id.clone();
                scope.spawn(move || {
                    barrier.wait();
                    service.accept(&worker_id(&format!("racer-{index}")), &job_id)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("claim thread"))
            .collect()
    });

    let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one claim succeeds");
    for outcome in outcomes.iter().filter(|r| r.is_err()) {
        assert!(
            matches!(outcome, Err(JobServiceError::Conflict)),
            "losers see a conflict, got {outcome:?}"
        );
    }

    let stored = harness.fetch(&job.id);
    assert_eq!(stored.status, JobStatus::Assigned);
    assert_eq!(stored.worker_id, winners[0].worker_id);
}

#[tokio::test]
async fn electrician_cannot_take_a_plumbing_job() {
    let harness = harness();
    let job = harness.post("plumber").await;

    let rejected = harness.service.accept(&worker_id(ELECTRICIAN), &job.id);
    match rejected {
        Err(err @ JobServiceError::SkillMismatch) => {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert_eq!(err.code(), "SKILL_MISMATCH");
        }
        other => panic!("expected skill mismatch, got {other:?}"),
    }
    let untouched = harness.fetch(&job.id);
    assert_eq!(untouched.status, JobStatus::Posted);
    assert!(untouched.worker_id.is_none());

    let claimed = harness
        .service
        .accept(&worker_id(PLUMBER), &job.id)
        .expect("plumber claims");
    assert_eq!(claimed.worker_id, Some(worker_id(PLUMBER)));
    assert!(claimed.assigned_at.is_some());
}

#[tokio::test]
async fn skills_are_compared_case_insensitively() {
    let harness = harness();
    let job = harness.post("Plumber").await;

    harness
        .service
        .accept(&worker_id(PLUMBER), &job.id)
        .expect("case differences do not matter");
}

#[tokio::test]
async fn workers_hold_one_job_at_a_time() {
    let harness = harness();
    let first = harness.post("plumber").await;
    let second = harness.post("plumber").await;
    harness
        .service
        .accept(&worker_id(PLUMBER), &first.id)
        .expect("first claim");

    let result = harness.service.accept(&worker_id(PLUMBER), &second.id);

    match result {
        Err(err @ JobServiceError::ActiveJobExists) => assert_eq!(err.code(), "ACTIVE_JOB_EXISTS"),
        other => panic!("expected active job rejection, got {other:?}"),
    }
    assert_eq!(harness.fetch(&second.id).status, JobStatus::Posted);
}

#[tokio::test]
async fn completed_jobs_do_not_count_as_held() {
    let harness = harness();
    harness.job_in(JobStatus::Completed).await;
    let next = harness.post("plumber").await;

    harness
        .service
        .accept(&worker_id(PLUMBER), &next.id)
        .expect("finished work does not block new claims");
}

#[tokio::test]
async fn missing_jobs_and_workers_are_reported() {
    let harness = harness();
    let job = harness.post("plumber").await;

    let missing_job = harness
        .service
        .accept(&worker_id(PLUMBER), &JobId("job-404".to_string()));
    assert!(matches!(missing_job, Err(JobServiceError::NotFound)));

    let missing_worker = harness.service.accept(&worker_id("ghost"), &job.id);
    assert!(matches!(missing_worker, Err(JobServiceError::WorkerNotFound)));
    assert_eq!(harness.fetch(&job.id).status, JobStatus::Posted);
}

fn scripted_service(
    answers: Vec<Option<WorkerProfile>>,
) -> (
    JobLifecycleService<InMemoryJobStore, ScriptedDirectory, MemoryMedia>,
    Arc<InMemoryJobStore>,
) {
    let store = Arc::new(InMemoryJobStore::new());
    let service = JobLifecycleService::new(
        store.clone(),
        Arc::new(ScriptedDirectory::new(answers)),
        Arc::new(MemoryMedia::default()),
        Arc::new(DistanceEstimator::great_circle_only()),
    );
    (service, store)
}

fn plumber_profile() -> WorkerProfile {
    WorkerProfile::new(PLUMBER, "Arun", &["plumber"])
}

#[tokio::test]
async fn claim_is_rolled_back_when_the_worker_loses_the_skill() {
    let retrained = WorkerProfile::new(PLUMBER, "Arun", &["painter"]);
    let (service, store) = scripted_service(vec![Some(plumber_profile()), Some(retrained)]);
    let job = service
        .create(&client_id(), submission("plumber"), None)
        .await
        .expect("job posted");

    let result = service.accept(&worker_id(PLUMBER), &job.id);

    assert!(matches!(result, Err(JobServiceError::SkillMismatch)));
    let restored = store.fetch(&job.id).expect("fetch").expect("present");
    assert_eq!(restored.status, JobStatus::Posted);
    assert!(restored.worker_id.is_none());
    assert!(restored.assigned_at.is_none());
}

#[tokio::test]
async fn claim_is_rolled_back_when_the_worker_disappears() {
    let (service, store) = scripted_service(vec![Some(plumber_profile()), None]);
    let job = service
        .create(&client_id(), submission("plumber"), None)
        .await
        .expect("job posted");

    let result = service.accept(&worker_id(PLUMBER), &job.id);

    assert!(matches!(result, Err(JobServiceError::WorkerNotFound)));
    let restored = store.fetch(&job.id).expect("fetch").expect("present");
    assert_eq!(restored.status, JobStatus::Posted);
    assert!(restored.is_consistent());
}

#[tokio::test]
async fn failed_rollback_is_surfaced_and_never_retried() {
    let store = Arc::new(ReleaseRefusingStore::default());
    let service = JobLifecycleService::new(
        store.clone(),
        Arc::new(ScriptedDirectory::new(vec![Some(plumber_profile()), None])),
        Arc::new(MemoryMedia::default()),
        Arc::new(DistanceEstimator::great_circle_only()),
    );
    let job = service
        .create(&client_id(), submission("plumber"), None)
        .await
        .expect("job posted");

    let result = service.accept(&worker_id(PLUMBER), &job.id);

    match result {
        Err(err @ JobServiceError::RollbackFailed) => {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.code(), "ROLLBACK_FAILED");
        }
        other => panic!("expected rollback failure, got {other:?}"),
    }
    let stuck = store.fetch(&job.id).expect("fetch").expect("present");
    assert_eq!(stuck.status, JobStatus::Assigned);
}

#[tokio::test]
async fn compensating_release_only_touches_the_rolled_back_claim() {
    let harness = harness();
    let job = harness.post("plumber").await;
    harness
        .service
        .accept(&worker_id(PLUMBER), &job.id)
        .expect("claim");

    let rollback_for_someone_else = JobMatch::in_statuses(&[JobStatus::Assigned])
        .held_by(&worker_id(ELECTRICIAN));
    let outcome = harness
        .store
        .update_where(&job.id, &rollback_for_someone_else, &JobUpdate::Release)
        .expect("write evaluated");

    assert!(outcome.is_none());
    assert_eq!(harness.fetch(&job.id).worker_id, Some(worker_id(PLUMBER)));
}
