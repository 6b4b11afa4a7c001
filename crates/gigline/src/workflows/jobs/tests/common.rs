use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::access::{Actor, InMemorySessions, SharedSessions};
use crate::integrations::distance::DistanceEstimator;
use crate::integrations::media::{MediaAsset, MediaError, MediaStore, MediaUpload};
use crate::workflows::identity::{
    ClientProfile, DirectoryError, IdentityDirectory, InMemoryIdentityDirectory, RatedParty,
    WorkerProfile,
};
use crate::workflows::jobs::completion::{CompletionCode, CompletionCodeSource};
use crate::workflows::jobs::domain::{
    ClientId, Coordinates, Job, JobId, JobStatus, JobSubmission, Urgency, WorkerId,
};
use crate::workflows::jobs::lifecycle::{JobMatch, JobUpdate};
use crate::workflows::jobs::repository::{JobRepository, RepositoryError};
use crate::workflows::jobs::service::JobLifecycleService;
use crate::workflows::jobs::store::InMemoryJobStore;

pub(super) type TestService =
    JobLifecycleService<InMemoryJobStore, InMemoryIdentityDirectory, MemoryMedia>;

pub(super) const CLIENT: &str = "client-ravi";
pub(super) const OTHER_CLIENT: &str = "client-meera";
pub(super) const PLUMBER: &str = "worker-arun";
pub(super) const ELECTRICIAN: &str = "worker-bela";

pub(super) fn client_id() -> ClientId {
    ClientId(CLIENT.to_string())
}

pub(super) fn worker_id(id: &str) -> WorkerId {
    WorkerId(id.to_string())
}

pub(super) fn bengaluru() -> Coordinates {
    Coordinates {
        latitude: 12.9716,
        longitude: 77.5946,
    }
}

pub(super) fn submission(skill: &str) -> JobSubmission {
    JobSubmission {
        title: "Fix leaking kitchen tap".to_string(),
        description: "Tap drips constantly; washer probably worn out.".to_string(),
        skill: skill.to_string(),
        urgency: Urgency::Normal,
        city: Some("Bengaluru".to_string()),
        latitude: Some(bengaluru().latitude),
        longitude: Some(bengaluru().longitude),
    }
}

pub(super) fn seeded_directory() -> InMemoryIdentityDirectory {
    let directory = InMemoryIdentityDirectory::new();
    directory
        .upsert_client(ClientProfile::new(CLIENT, "Ravi"))
        .expect("seed client");
    directory
        .upsert_client(ClientProfile::new(OTHER_CLIENT, "Meera"))
        .expect("seed client");
    directory
        .upsert_worker(WorkerProfile::new(PLUMBER, "Arun", &["plumber"]).located_at(bengaluru()))
        .expect("seed worker");
    directory
        .upsert_worker(
            WorkerProfile::new(ELECTRICIAN, "Bela", &["electrician"]).located_at(bengaluru()),
        )
        .expect("seed worker");
    directory
}

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryJobStore>,
    pub(super) directory: Arc<InMemoryIdentityDirectory>,
    pub(super) media: Arc<MemoryMedia>,
}

pub(super) fn harness() -> Harness {
    harness_with_codes(Arc::new(FixedCodes::new(&["482913"])))
}

pub(super) fn harness_with_codes(codes: Arc<dyn CompletionCodeSource>) -> Harness {
    let store = Arc::new(InMemoryJobStore::new());
    let directory = Arc::new(seeded_directory());
    let media = Arc::new(MemoryMedia::default());
    let service = JobLifecycleService::new(
        store.clone(),
        directory.clone(),
        media.clone(),
        Arc::new(DistanceEstimator::great_circle_only()),
    )
    .with_code_source(codes);
    Harness {
        service: Arc::new(service),
        store,
        directory,
        media,
    }
}

impl Harness {
    pub(super) async fn post(&self, skill: &str) -> Job {
        self.service
            .create(&client_id(), submission(skill), None)
            .await
            .expect("job posted")
    }

    /// Post a job and drive it to the requested status with the plumber as assignee.
    pub(super) async fn job_in(&self, status: JobStatus) -> Job {
        let job = self.post("plumber").await;
        let plumber = worker_id(PLUMBER);
        if status == JobStatus::Posted {
            return job;
        }
        self.service.accept(&plumber, &job.id).expect("claim");
        if status == JobStatus::Assigned {
            return self.fetch(&job.id);
        }
        self.service.start(&client_id(), &job.id).expect("start");
        if status == JobStatus::Active {
            return self.fetch(&job.id);
        }
        let code = self
            .service
            .issue_completion_code(&plumber, &job.id)
            .expect("code issued");
        self.service
            .complete(&client_id(), &job.id, code.as_str())
            .expect("complete")
    }

    pub(super) fn fetch(&self, id: &JobId) -> Job {
        self.store
            .fetch(id)
            .expect("fetch succeeds")
            .expect("job present")
    }
}

/// Hands out a fixed sequence of codes, repeating the last one.
#[derive(Debug)]
pub(super) struct FixedCodes {
    codes: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl FixedCodes {
    pub(super) fn new(codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|code| code.to_string()).collect()),
            last: Mutex::new("000000".to_string()),
        }
    }
}

impl CompletionCodeSource for FixedCodes {
    fn next_code(&self) -> CompletionCode {
        let mut last = self.last.lock().expect("codes mutex poisoned");
        if let Some(next) = self.codes.lock().expect("codes mutex poisoned").pop_front() {
            *last = next;
        }
        CompletionCode::parse(&last).expect("fixture codes are six digits")
    }
}

#[derive(Default)]
pub(super) struct MemoryMedia {
    pub(super) fail_uploads: bool,
    uploads: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryMedia {
    pub(super) fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub(super) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().expect("media mutex poisoned").clone()
    }

    pub(super) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("media mutex poisoned").clone()
    }
}

#[async_trait]
impl MediaStore for MemoryMedia {
    async fn upload(&self, file: MediaUpload, folder: &str) -> Result<MediaAsset, MediaError> {
        if self.fail_uploads {
            return Err(MediaError::Backend("upload quota exceeded".to_string()));
        }
        let handle = format!("{folder}/{}", file.file_name);
        self.uploads
            .lock()
            .expect("media mutex poisoned")
            .push(handle.clone());
        Ok(MediaAsset {
            url: format!("https://media.test/{handle}"),
            handle,
        })
    }

    async fn delete(&self, handle: &str) -> Result<(), MediaError> {
        self.deleted
            .lock()
            .expect("media mutex poisoned")
            .push(handle.to_string());
        Ok(())
    }
}

pub(super) fn image_upload() -> MediaUpload {
    MediaUpload {
        file_name: "tap.jpg".to_string(),
        content_type: Some("image/jpeg".to_string()),
        bytes: vec![0xff, 0xd8, 0xff],
    }
}

/// Directory whose worker lookups follow a script; once exhausted the last answer repeats.
/// Used to change a worker profile between the claim and its post-checks.
pub(super) struct ScriptedDirectory {
    answers: Mutex<VecDeque<Option<WorkerProfile>>>,
    last: Mutex<Option<WorkerProfile>>,
}

impl ScriptedDirectory {
    pub(super) fn new(answers: Vec<Option<WorkerProfile>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            last: Mutex::new(None),
        }
    }
}

impl IdentityDirectory for ScriptedDirectory {
    fn find_worker(&self, _id: &WorkerId) -> Result<Option<WorkerProfile>, DirectoryError> {
        let mut last = self.last.lock().expect("script mutex poisoned");
        if let Some(next) = self.answers.lock().expect("script mutex poisoned").pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    fn find_client(&self, id: &ClientId) -> Result<Option<ClientProfile>, DirectoryError> {
        Ok(Some(ClientProfile::new(id.0.clone(), "Scripted")))
    }

    fn record_completed_job(&self, _id: &WorkerId) -> Result<(), DirectoryError> {
        Ok(())
    }

    fn record_rating(&self, _party: &RatedParty, _rating: u8) -> Result<(), DirectoryError> {
        Ok(())
    }
}

/// Store that refuses compensating releases, leaving claims in place.
#[derive(Default)]
pub(super) struct ReleaseRefusingStore {
    pub(super) inner: InMemoryJobStore,
}

impl JobRepository for ReleaseRefusingStore {
    fn insert(&self, job: Job) -> Result<Job, RepositoryError> {
        self.inner.insert(job)
    }

    fn fetch(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn update_where(
        &self,
        id: &JobId,
        predicate: &JobMatch,
        update: &JobUpdate,
    ) -> Result<Option<Job>, RepositoryError> {
        if matches!(update, JobUpdate::Release) {
            return Err(RepositoryError::Unavailable("write timeout".to_string()));
        }
        self.inner.update_where(id, predicate, update)
    }

    fn delete_where(
        &self,
        id: &JobId,
        predicate: &JobMatch,
    ) -> Result<Option<Job>, RepositoryError> {
        self.inner.delete_where(id, predicate)
    }

    fn held_by_worker(&self, worker: &WorkerId) -> Result<Vec<Job>, RepositoryError> {
        self.inner.held_by_worker(worker)
    }

    fn for_worker(&self, worker: &WorkerId) -> Result<Vec<Job>, RepositoryError> {
        self.inner.for_worker(worker)
    }

    fn for_client(&self, client: &ClientId) -> Result<Vec<Job>, RepositoryError> {
        self.inner.for_client(client)
    }

    fn open_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        self.inner.open_jobs()
    }

    fn all(&self) -> Result<Vec<Job>, RepositoryError> {
        self.inner.all()
    }
}

pub(super) fn sessions_for(actors: &[(&str, Actor)]) -> SharedSessions {
    let sessions = InMemorySessions::new();
    for (token, actor) in actors {
        sessions.insert(*token, actor.clone());
    }
    Arc::new(sessions)
}

pub(super) fn assert_error(response: &Response, status: StatusCode) {
    assert_eq!(response.status(), status);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
