use crate::infra::{kochi, seed_demo_accounts, Marketplace};
use clap::Args;
use gigline::access::Actor;
use gigline::config::{MediaConfig, VerificationConfig};
use gigline::error::AppError;
use gigline::integrations::{DistanceEstimator, MediaUpload};
use gigline::workflows::identity::IdentityDirectory;
use gigline::workflows::jobs::{AvailableJobsQuery, ClientId, JobSubmission, Urgency, WorkerId};
use gigline::workflows::reviews::ReviewSubmission;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Skill tag for the demo job.
    #[arg(long, default_value = "plumber")]
    pub(crate) skill: String,
    /// Submit a wrong completion code before the real one.
    #[arg(long)]
    pub(crate) wrong_code: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { skill, wrong_code } = args;

    println!("Gigline marketplace demo");
    let marketplace = Marketplace::new(
        &MediaConfig::default(),
        &VerificationConfig::default(),
        DistanceEstimator::great_circle_only(),
    );
    let accounts = seed_demo_accounts(&marketplace)?;

    let Some(client) = accounts.iter().find_map(|account| match &account.actor {
        Actor::Client(id) => Some(id.clone()),
        _ => None,
    }) else {
        println!("  No client account seeded");
        return Ok(());
    };
    let workers = marketplace.directory.workers()?;
    println!("\nAccounts");
    println!("- client {client}");
    for worker in &workers {
        println!("- worker {} ({}) skills: {}", worker.id, worker.name, worker.skills.join(", "));
    }

    let Some(worker) = workers
        .iter()
        .find(|profile| profile.has_skill(&skill))
        .map(|profile| profile.id.clone())
    else {
        println!("\nNo demo worker offers '{skill}'. Try plumber, carpenter, or electrician.");
        return Ok(());
    };
    let bystander = workers
        .iter()
        .find(|profile| !profile.has_skill(&skill))
        .map(|profile| profile.id.clone());

    let location = kochi();
    let submission = JobSubmission {
        title: format!("Need a {skill} today"),
        description: "Demo request posted from the command line.".to_string(),
        skill: skill.clone(),
        urgency: Urgency::Urgent,
        city: Some("Kochi".to_string()),
        latitude: Some(location.latitude),
        longitude: Some(location.longitude),
    };
    let photo = MediaUpload {
        file_name: "request.png".to_string(),
        content_type: None,
        bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
    };
    let job = match marketplace.jobs.create(&client, submission, Some(photo)).await {
        Ok(job) => job,
        Err(err) => {
            println!("  Posting rejected: {err}");
            return Ok(());
        }
    };
    println!("\n1. Client posted job {} -> {}", job.id, job.status);
    if let Some(stored) = job
        .image
        .as_ref()
        .and_then(|image| marketplace.media.get(&image.handle))
    {
        println!(
            "   Photo stored in '{}' as {} ({} bytes, {} object(s) held)",
            stored.folder,
            stored.mime,
            stored.bytes.len(),
            marketplace.media.len()
        );
    }

    match marketplace.jobs.available(&worker, AvailableJobsQuery::default()).await {
        Ok(page) => {
            println!("2. Worker {worker} browses {} open job(s) nearby", page.total);
            for available in &page.jobs {
                let distance = available
                    .distance
                    .map(|km| format!("{km:.1} km"))
                    .unwrap_or_else(|| "distance unknown".to_string());
                println!("   - {} [{}] {}", available.job.title, available.job.skill, distance);
            }
        }
        Err(err) => println!("2. Browse unavailable: {err}"),
    }

    if let Some(bystander) = bystander {
        match marketplace.jobs.accept(&bystander, &job.id) {
            Ok(_) => println!("   Unexpected: {bystander} claimed a job outside their skills"),
            Err(err) => println!(
                "   {bystander} tried to accept: {} ({})",
                err.public_message(),
                err.code()
            ),
        }
    }

    if !step(3, "Worker accepts", marketplace.jobs.accept(&worker, &job.id)) {
        return Ok(());
    }
    if !step(4, "Client starts work", marketplace.jobs.start(&client, &job.id)) {
        return Ok(());
    }

    let code = match marketplace.jobs.issue_completion_code(&worker, &job.id) {
        Ok(code) => code,
        Err(err) => {
            println!("5. Completion code unavailable: {}", err.public_message());
            return Ok(());
        }
    };
    println!("5. Worker generated completion code {}", code.as_str());

    if wrong_code {
        let guess = if code.as_str() == "000000" { "111111" } else { "000000" };
        if let Err(err) = marketplace.jobs.complete(&client, &job.id, guess) {
            println!("   Client entered {guess}: {} ({})", err.public_message(), err.code());
        }
    }
    if !step(
        6,
        "Client confirms the code",
        marketplace.jobs.complete(&client, &job.id, code.as_str()),
    ) {
        return Ok(());
    }

    rate(&marketplace, &client, &worker, &job.id).await;

    if let Ok(Some(profile)) = marketplace.directory.find_worker(&worker) {
        println!(
            "\nWorker {} now has {} completed job(s), rating {}",
            profile.name,
            profile.completed_jobs,
            profile
                .rating
                .average()
                .map(|average| format!("{average:.1}"))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    match marketplace.reporting.summary() {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("\nAdmin summary:\n{json}"),
            Err(err) => println!("\nAdmin summary unavailable: {err}"),
        },
        Err(err) => println!("\nAdmin summary unavailable: {err}"),
    }

    Ok(())
}

fn step<E>(
    index: usize,
    label: &str,
    outcome: Result<gigline::workflows::jobs::Job, E>,
) -> bool
where
    E: std::fmt::Display,
{
    match outcome {
        Ok(job) => {
            println!("{index}. {label} -> {}", job.status);
            true
        }
        Err(err) => {
            println!("{index}. {label} failed: {err}");
            false
        }
    }
}

async fn rate(
    marketplace: &Marketplace,
    client: &ClientId,
    worker: &WorkerId,
    job_id: &gigline::workflows::jobs::JobId,
) {
    let for_worker = ReviewSubmission {
        rating: Some(5),
        review: Some("Arrived on time and cleaned up.".to_string()),
    };
    match marketplace.reviews.rate_worker(client, job_id, &for_worker) {
        Ok(review) => println!("7. Client rated the worker {}/5", review.rating),
        Err(err) => println!("7. Worker review rejected: {err}"),
    }

    let for_client = ReviewSubmission {
        rating: Some(4),
        review: None,
    };
    match marketplace.reviews.rate_client(worker, job_id, &for_client) {
        Ok(review) => println!("8. Worker rated the client {}/5", review.rating),
        Err(err) => println!("8. Client review rejected: {err}"),
    }

    if let Err(err) = marketplace.reviews.rate_worker(client, job_id, &for_worker) {
        println!("   A second review for the same job is refused: {err}");
    }
}
