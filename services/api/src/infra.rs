use async_trait::async_trait;
use gigline::access::{Actor, InMemorySessions};
use gigline::config::{AppConfig, MediaConfig, VerificationConfig};
use gigline::error::AppError;
use gigline::integrations::{DistanceEstimator, MediaAsset, MediaError, MediaStore, MediaUpload};
use gigline::workflows::identity::{ClientProfile, InMemoryIdentityDirectory, WorkerProfile};
use gigline::workflows::jobs::{
    ClientId, Coordinates, InMemoryJobStore, JobLifecycleService, WorkerId,
};
use gigline::workflows::reporting::ReportingService;
use gigline::workflows::reviews::{InMemoryReviewStore, ReviewService};
use gigline::workflows::verification::{InMemoryOtpStore, LogNotifier, VerificationService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stored object held by [`InMemoryMediaStore`].
#[derive(Debug, Clone)]
pub(crate) struct StoredMedia {
    pub(crate) folder: String,
    pub(crate) mime: String,
    pub(crate) bytes: Vec<u8>,
}

/// Media host used when no Drive credentials are wired in. Files live for the process lifetime.
#[derive(Default)]
pub(crate) struct InMemoryMediaStore {
    objects: Mutex<HashMap<String, StoredMedia>>,
    sequence: AtomicU64,
}

impl InMemoryMediaStore {
    pub(crate) fn get(&self, handle: &str) -> Option<StoredMedia> {
        self.objects.lock().ok()?.get(handle).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn upload(&self, file: MediaUpload, folder: &str) -> Result<MediaAsset, MediaError> {
        if file.bytes.is_empty() {
            return Err(MediaError::Rejected("empty file".to_string()));
        }
        let mime = file.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&file.file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = format!("{folder}/{id:06}-{}", file.file_name);

        let mut guard = self
            .objects
            .lock()
            .map_err(|_| MediaError::Backend("media mutex poisoned".to_string()))?;
        guard.insert(
            handle.clone(),
            StoredMedia {
                folder: folder.to_string(),
                mime,
                bytes: file.bytes,
            },
        );

        Ok(MediaAsset {
            url: format!("memory://{handle}"),
            handle,
        })
    }

    async fn delete(&self, handle: &str) -> Result<(), MediaError> {
        let mut guard = self
            .objects
            .lock()
            .map_err(|_| MediaError::Backend("media mutex poisoned".to_string()))?;
        guard
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| MediaError::Rejected(format!("unknown media handle '{handle}'")))
    }
}

pub(crate) type Jobs =
    JobLifecycleService<InMemoryJobStore, InMemoryIdentityDirectory, InMemoryMediaStore>;
pub(crate) type Reviews =
    ReviewService<InMemoryJobStore, InMemoryReviewStore, InMemoryIdentityDirectory>;
pub(crate) type Verification = VerificationService<InMemoryOtpStore, LogNotifier>;
pub(crate) type Reporting = ReportingService<InMemoryJobStore, InMemoryReviewStore>;

/// Every service of the marketplace wired against the in-memory stores.
pub(crate) struct Marketplace {
    pub(crate) directory: Arc<InMemoryIdentityDirectory>,
    pub(crate) sessions: InMemorySessions,
    pub(crate) media: Arc<InMemoryMediaStore>,
    pub(crate) jobs: Arc<Jobs>,
    pub(crate) reviews: Arc<Reviews>,
    pub(crate) verification: Arc<Verification>,
    pub(crate) reporting: Arc<Reporting>,
}

impl Marketplace {
    pub(crate) fn in_memory(config: &AppConfig) -> Result<Self, AppError> {
        let distance = DistanceEstimator::from_config(&config.distance)?;
        Ok(Self::new(&config.media, &config.verification, distance))
    }

    pub(crate) fn new(
        media_config: &MediaConfig,
        verification_config: &VerificationConfig,
        distance: DistanceEstimator,
    ) -> Self {
        let job_store = Arc::new(InMemoryJobStore::new());
        let review_store = Arc::new(InMemoryReviewStore::new());
        let directory = Arc::new(InMemoryIdentityDirectory::new());
        let media = Arc::new(InMemoryMediaStore::default());

        let jobs = JobLifecycleService::new(
            job_store.clone(),
            directory.clone(),
            media.clone(),
            Arc::new(distance),
        )
        .with_media_folder(media_config.job_folder.clone());
        let reviews =
            ReviewService::new(job_store.clone(), review_store.clone(), directory.clone());
        let verification = VerificationService::new(
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(LogNotifier),
            verification_config,
        );
        let reporting = ReportingService::new(job_store, review_store);

        Self {
            directory,
            sessions: InMemorySessions::new(),
            media,
            jobs: Arc::new(jobs),
            reviews: Arc::new(reviews),
            verification: Arc::new(verification),
            reporting: Arc::new(reporting),
        }
    }
}

/// Named demo account plus the session token that acts as it.
#[derive(Debug, Clone)]
pub(crate) struct DemoAccount {
    pub(crate) label: &'static str,
    pub(crate) actor: Actor,
    pub(crate) token: String,
}

pub(crate) fn kochi() -> Coordinates {
    Coordinates {
        latitude: 9.9312,
        longitude: 76.2673,
    }
}

/// Register one client, two workers, and an admin, each with a fresh session token.
pub(crate) fn seed_demo_accounts(marketplace: &Marketplace) -> Result<Vec<DemoAccount>, AppError> {
    let directory = &marketplace.directory;
    directory.upsert_client(ClientProfile::new("client-anita", "Anita"))?;
    directory.upsert_worker(
        WorkerProfile::new("worker-joseph", "Joseph", &["plumber", "carpenter"])
            .located_at(kochi()),
    )?;
    directory.upsert_worker(
        WorkerProfile::new("worker-fathima", "Fathima", &["electrician"]).located_at(kochi()),
    )?;

    let accounts = [
        ("client", Actor::Client(ClientId("client-anita".to_string()))),
        ("plumber", Actor::Worker(WorkerId("worker-joseph".to_string()))),
        ("electrician", Actor::Worker(WorkerId("worker-fathima".to_string()))),
        ("admin", Actor::Admin("ops".to_string())),
    ];
    Ok(accounts
        .into_iter()
        .map(|(label, actor)| DemoAccount {
            label,
            token: marketplace.sessions.issue(actor.clone()),
            actor,
        })
        .collect())
}
