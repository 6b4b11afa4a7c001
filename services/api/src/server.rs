use crate::cli::ServeArgs;
use crate::infra::{seed_demo_accounts, AppState, Marketplace};
use crate::routes::marketplace_app;
use axum_prometheus::PrometheusMetricLayer;
use gigline::config::{AppConfig, AppEnvironment};
use gigline::error::AppError;
use gigline::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let marketplace = Marketplace::in_memory(&config)?;
    if config.environment == AppEnvironment::Development || args.seed_demo {
        for account in seed_demo_accounts(&marketplace)? {
            info!(
                account = account.label,
                actor = ?account.actor,
                token = %account.token,
                "demo session issued"
            );
        }
    }

    let app = marketplace_app(&marketplace, app_state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "gigline marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}
