use std::sync::Arc;

use super::common::*;
use crate::access::Actor;
use crate::integrations::distance::DistanceEstimator;
use crate::integrations::media::MediaUpload;
use crate::workflows::identity::WorkerProfile;
use crate::workflows::jobs::domain::{Job, JobStatus, PaymentStatus};
use crate::workflows::jobs::lifecycle::JobOperation;
use crate::workflows::jobs::repository::JobRepository;
use crate::workflows::jobs::service::{JobLifecycleService, JobServiceError};

const SECOND_PLUMBER: &str = "worker-chandra";

async fn run(harness: &Harness, operation: JobOperation, job: &Job) -> Result<(), JobServiceError> {
    let client = client_id();
    let plumber = worker_id(PLUMBER);
    match operation {
        JobOperation::Claim => harness
            .service
            .accept(&worker_id(SECOND_PLUMBER), &job.id)
            .map(drop),
        JobOperation::Start => harness.service.start(&client, &job.id).map(drop),
        JobOperation::ReleaseByWorker => harness
            .service
            .release_by_worker(&plumber, &job.id)
            .map(drop),
        JobOperation::CancelByClient => harness
            .service
            .cancel_by_client(&client, &job.id)
            .await
            .map(drop),
        JobOperation::IssueCompletionCode => harness
            .service
            .issue_completion_code(&plumber, &job.id)
            .map(drop),
        JobOperation::Complete => {
            let code = if job.status == JobStatus::Active {
                harness
                    .service
                    .issue_completion_code(&plumber, &job.id)?
                    .as_str()
                    .to_string()
            } else {
                "482913".to_string()
            };
            harness
                .service
                .complete(&client, &job.id, &code)
                .map(drop)
        }
    }
}

#[tokio::test]
async fn every_status_and_operation_pair_follows_the_transition_table() {
    for status in JobStatus::ALL {
        for operation in JobOperation::ALL {
            let harness = harness();
            harness
                .directory
                .upsert_worker(WorkerProfile::new(SECOND_PLUMBER, "Chandra", &["plumber"]))
                .expect("seed worker");
            let job = harness.job_in(status).await;

            let outcome = run(&harness, operation, &job).await;

            assert_eq!(
                outcome.is_ok(),
                operation.permits(status),
                "{operation:?} from {status:?} gave {outcome:?}"
            );
            if outcome.is_err() {
                let after = harness.store.fetch(&job.id).expect("fetch succeeds");
                assert_eq!(
                    after.map(|job| job.status),
                    Some(status),
                    "rejected {operation:?} must leave the job untouched"
                );
            }
        }
    }
}

#[tokio::test]
async fn created_jobs_are_posted_without_a_worker() {
    let harness = harness();
    let job = harness
        .service
        .create(&client_id(), submission("plumber"), Some(image_upload()))
        .await
        .expect("job posted");

    assert_eq!(job.status, JobStatus::Posted);
    assert!(job.worker_id.is_none());
    assert!(job.completion_otp.is_none());
    assert_eq!(job.payment_status, PaymentStatus::Pending);
    assert_eq!(harness.media.uploads(), vec!["jobs/tap.jpg".to_string()]);
    assert_eq!(
        job.image.as_ref().map(|image| image.url.as_str()),
        Some("https://media.test/jobs/tap.jpg")
    );
    assert!(job.is_consistent());
}

#[tokio::test]
async fn failed_uploads_do_not_block_posting() {
    let service = JobLifecycleService::new(
        Arc::new(crate::workflows::jobs::store::InMemoryJobStore::new()),
        Arc::new(seeded_directory()),
        Arc::new(MemoryMedia::failing()),
        Arc::new(DistanceEstimator::great_circle_only()),
    );

    let job = service
        .create(&client_id(), submission("plumber"), Some(image_upload()))
        .await
        .expect("job still posted");

    assert!(job.image.is_none());
}

#[tokio::test]
async fn non_image_attachments_are_rejected() {
    let harness = harness();
    let upload = MediaUpload {
        file_name: "invoice.pdf".to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: vec![0x25, 0x50, 0x44, 0x46],
    };

    let result = harness
        .service
        .create(&client_id(), submission("plumber"), Some(upload))
        .await;

    assert!(matches!(result, Err(JobServiceError::Validation(_))));
    assert!(harness.store.all().expect("list").is_empty());
}

#[tokio::test]
async fn incomplete_submissions_are_rejected() {
    let harness = harness();
    let mut missing_location = submission("plumber");
    missing_location.city = None;
    missing_location.latitude = None;
    missing_location.longitude = None;

    let result = harness
        .service
        .create(&client_id(), missing_location, None)
        .await;

    match result {
        Err(err @ JobServiceError::Validation(_)) => assert_eq!(err.code(), "VALIDATION_ERROR"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn only_the_owner_can_start_a_job() {
    let harness = harness();
    let job = harness.job_in(JobStatus::Assigned).await;

    let result = harness
        .service
        .start(&crate::workflows::jobs::domain::ClientId(OTHER_CLIENT.to_string()), &job.id);

    assert!(matches!(result, Err(JobServiceError::Forbidden)));
    assert_eq!(harness.fetch(&job.id).status, JobStatus::Assigned);
}

#[tokio::test]
async fn worker_release_returns_job_to_the_open_pool() {
    let harness = harness();
    let job = harness.job_in(JobStatus::Active).await;
    harness
        .service
        .issue_completion_code(&worker_id(PLUMBER), &job.id)
        .expect("code issued");

    let released = harness
        .service
        .release_by_worker(&worker_id(PLUMBER), &job.id)
        .expect("release");

    assert_eq!(released.status, JobStatus::Posted);
    assert!(released.worker_id.is_none());
    assert!(released.assigned_at.is_none());
    assert!(released.started_at.is_none());
    assert!(released.completion_otp.is_none());
    assert!(released.is_consistent());

    let open = harness.store.open_jobs().expect("open jobs");
    assert_eq!(open.len(), 1);

    harness
        .service
        .accept(&worker_id(PLUMBER), &job.id)
        .expect("job can be claimed again");
}

#[tokio::test]
async fn cancelling_removes_the_job_and_releases_its_image() {
    let harness = harness();
    let job = harness
        .service
        .create(&client_id(), submission("plumber"), Some(image_upload()))
        .await
        .expect("job posted");

    harness
        .service
        .cancel_by_client(&client_id(), &job.id)
        .await
        .expect("cancel");

    assert!(harness.store.fetch(&job.id).expect("fetch").is_none());
    assert_eq!(harness.media.deleted(), vec!["jobs/tap.jpg".to_string()]);

    let again = harness.service.cancel_by_client(&client_id(), &job.id).await;
    assert!(matches!(again, Err(JobServiceError::NotFound)));
}

#[tokio::test]
async fn completed_jobs_cannot_be_cancelled() {
    let harness = harness();
    let job = harness.job_in(JobStatus::Completed).await;

    let result = harness.service.cancel_by_client(&client_id(), &job.id).await;

    match result {
        Err(err @ JobServiceError::InvalidState(_)) => {
            assert_eq!(err.to_string(), "cannot cancel a job that is completed");
            assert_eq!(err.code(), "INVALID_STATE");
        }
        other => panic!("expected invalid state, got {other:?}"),
    }
    assert_eq!(harness.fetch(&job.id).status, JobStatus::Completed);
}

#[tokio::test]
async fn jobs_are_visible_to_their_parties_and_admins() {
    let harness = harness();
    let job = harness.job_in(JobStatus::Assigned).await;

    assert!(harness
        .service
        .get(&Actor::Client(client_id()), &job.id)
        .is_ok());
    assert!(harness
        .service
        .get(&Actor::Worker(worker_id(PLUMBER)), &job.id)
        .is_ok());
    assert!(harness
        .service
        .get(&Actor::Admin("ops".to_string()), &job.id)
        .is_ok());
    assert!(matches!(
        harness
            .service
            .get(&Actor::Worker(worker_id(ELECTRICIAN)), &job.id),
        Err(JobServiceError::Forbidden)
    ));
}

#[tokio::test]
async fn listing_is_scoped_to_the_actor() {
    let harness = harness();
    let held = harness.job_in(JobStatus::Assigned).await;
    harness.post("electrician").await;

    let client_jobs = harness
        .service
        .list_mine(&Actor::Client(client_id()))
        .expect("client listing");
    assert_eq!(client_jobs.len(), 2);

    let worker_jobs = harness
        .service
        .list_mine(&Actor::Worker(worker_id(PLUMBER)))
        .expect("worker listing");
    assert_eq!(worker_jobs.len(), 1);
    assert_eq!(worker_jobs[0].id, held.id);
}

#[tokio::test]
async fn worker_operations_on_an_unheld_job_are_state_errors() {
    let harness = harness();
    let posted = harness.post("plumber").await;
    let plumber = worker_id(PLUMBER);

    let release = harness.service.release_by_worker(&plumber, &posted.id);
    let issue = harness.service.issue_completion_code(&plumber, &posted.id);

    for outcome in [release.map(drop), issue.map(drop)] {
        match outcome {
            Err(err @ JobServiceError::InvalidState(_)) => {
                assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
                assert_eq!(err.code(), "INVALID_STATE");
            }
            other => panic!("expected invalid state, got {other:?}"),
        }
    }
    assert_eq!(harness.fetch(&posted.id).status, JobStatus::Posted);

    let held = harness.job_in(JobStatus::Active).await;
    let stranger = harness.service.release_by_worker(&worker_id(ELECTRICIAN), &held.id);
    match stranger {
        Err(err @ JobServiceError::Forbidden) => {
            assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN)
        }
        other => panic!("expected forbidden, got {other:?}"),
    }
}
