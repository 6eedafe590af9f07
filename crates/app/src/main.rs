use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use clap::Parser;
use prep_app::config::{Config, prepare_sqlite_file};
use prep_app::{AppState, router, throttle};
use services::{AppServices, Clock, RateLimitPolicy};
use storage::seed::seed_master_data;
use tracing_subscriber::EnvFilter;

const PURGE_INTERVAL: StdDuration = StdDuration::from_secs(60);

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::parse();
    let db_url = config.database_url();

    prepare_sqlite_file(&db_url)?;
    let clock = Clock::default_clock();
    let services = AppServices::new_sqlite(&db_url, clock)
        .await?
        .with_session_ttl(Duration::days(config.session_ttl_days));

    if config.seed {
        let report = seed_master_data(services.storage(), clock.now()).await?;
        tracing::info!(
            created = report.exams_created,
            skipped = report.exams_skipped,
            topics = report.topics_created,
            "seeded master data"
        );
    }

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let admin = services.auth().ensure_admin(email, password).await?;
        tracing::info!(user_id = %admin.id, "admin account ready");
    }

    let policy = RateLimitPolicy {
        max_requests: config.rate_limit_max_requests,
        window: Duration::seconds(config.rate_limit_window_secs),
    };
    let state = AppState::new(services, policy, config.secure_cookies);
    tokio::spawn(throttle::purge_task(state.clone(), PURGE_INTERVAL));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(address = %config.bind, "listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
