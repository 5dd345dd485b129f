use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedrelay_backend::domain::blackout::{BlackoutGate, SystemClock};
use feedrelay_backend::domain::dedup::DedupService;
use feedrelay_backend::domain::delivery::DeliveryService;
use feedrelay_backend::domain::fanout::FanoutService;
use feedrelay_backend::domain::ingest::IngestService;
use feedrelay_backend::domain::maintenance::MaintenanceService;
use feedrelay_backend::domain::settings::SettingsService;
use feedrelay_backend::infrastructure::config::{Config, LogFormat};
use feedrelay_backend::infrastructure::db::{check_connection, create_pool, run_migrations};
use feedrelay_backend::infrastructure::fetch::{FeedFetcher, HttpFeedFetcher};
use feedrelay_backend::infrastructure::http::start_http_server;
use feedrelay_backend::infrastructure::lock::select_lock_manager;
use feedrelay_backend::infrastructure::periods::{HttpQuietPeriodSource, QuietPeriodSource};
use feedrelay_backend::infrastructure::transport::{HttpGatewayTransport, Transport};
use feedrelay_backend::scheduler::{
    spawn_poll_loop, spawn_retention_loop, spawn_send_loop, spawn_watchdog_loop,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        instance_id = %config.instance_id,
        "Starting FeedRelay Backend on {}:{}",
        config.host,
        config.port
    );

    // Create database connection pool
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Verify database connection and apply schema
    check_connection(&pool).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database connection verified");

    let pool = Arc::new(pool);
    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate repositories (inject db pool)
    tracing::info!("Instantiating repositories...");
    let feed_repo = Arc::new(feedrelay_backend::infrastructure::repositories::FeedRepository::new(pool.clone()));
    let item_repo = Arc::new(feedrelay_backend::infrastructure::repositories::FeedItemRepository::new(pool.clone()));
    let schedule_repo = Arc::new(feedrelay_backend::infrastructure::repositories::ScheduleRepository::new(pool.clone()));
    let obligation_repo = Arc::new(feedrelay_backend::infrastructure::repositories::ObligationRepository::new(pool.clone()));
    let settings_repo = Arc::new(feedrelay_backend::infrastructure::repositories::SettingsRepository::new(pool.clone()));

    let settings = Arc::new(SettingsService::new(settings_repo));

    // 2. Instantiate external collaborator clients
    tracing::info!("Instantiating collaborator clients...");
    let fetcher: Arc<dyn FeedFetcher> = Arc::new(HttpFeedFetcher::new(config.fetcher_url.clone()));
    let transport: Arc<dyn Transport> = Arc::new(HttpGatewayTransport::new(
        config.gateway_url.clone(),
        config.gateway_token.clone(),
    ));
    let period_source: Arc<dyn QuietPeriodSource> =
        Arc::new(HttpQuietPeriodSource::new(config.quiet_periods_url.clone()));

    // 3. Pick the lock strategy for this environment
    let lock_ttl = settings.lock_ttl().await?;
    let lock_manager = select_lock_manager(pool.clone(), config.instance_id.clone(), lock_ttl).await;

    let blackout_cache_ttl = settings.blackout_cache_ttl().await?;
    let gate = Arc::new(BlackoutGate::new(
        period_source,
        settings.clone(),
        Arc::new(SystemClock),
        blackout_cache_ttl,
    ));

    // 4. Instantiate services (inject repositories and clients)
    tracing::info!("Instantiating services...");
    let dedup = Arc::new(DedupService::new(item_repo.clone()));
    let fanout = Arc::new(FanoutService::new(
        schedule_repo.clone(),
        obligation_repo.clone(),
    ));
    let delivery = Arc::new(DeliveryService::new(
        schedule_repo.clone(),
        obligation_repo.clone(),
        item_repo.clone(),
        transport.clone(),
        gate.clone(),
        lock_manager.clone(),
        settings.clone(),
    ));
    let ingest = Arc::new(IngestService::new(
        feed_repo.clone(),
        item_repo.clone(),
        schedule_repo.clone(),
        fetcher,
        dedup,
        fanout,
        delivery.clone(),
        settings.clone(),
    ));
    let maintenance = Arc::new(MaintenanceService::new(
        obligation_repo.clone(),
        item_repo.clone(),
        settings.clone(),
    ));

    // 5. Instantiate controllers (inject services)
    tracing::info!("Instantiating controllers...");
    let feed_controller = Arc::new(feedrelay_backend::controllers::FeedController::new(
        ingest.clone(),
    ));
    let schedule_controller = Arc::new(feedrelay_backend::controllers::ScheduleController::new(
        delivery.clone(),
        schedule_repo.clone(),
        obligation_repo.clone(),
        gate.clone(),
        lock_manager.clone(),
    ));

    // 6. Spawn the timer loops
    tracing::info!("Spawning background loops...");
    let _poll_loop = spawn_poll_loop(
        ingest,
        feed_repo.clone(),
        Duration::from_secs(config.poll_tick_secs),
    );
    let _send_loop = spawn_send_loop(
        delivery,
        schedule_repo.clone(),
        Duration::from_secs(config.send_tick_secs),
    );
    let _watchdog_loop =
        spawn_watchdog_loop(maintenance.clone(), Duration::from_secs(config.watchdog_tick_secs));
    let _retention_loop =
        spawn_retention_loop(maintenance, Duration::from_secs(config.retention_tick_secs));

    // Start HTTP server with all routes
    start_http_server(pool, config, transport, feed_controller, schedule_controller).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "feedrelay_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "feedrelay_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
