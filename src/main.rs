//! EventHub Server: event lifecycle scheduler and notification delivery
//!
//! Main entry point that wires all crates together and starts the
//! background tasks.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt};

use eventhub_cache::CacheManager;
use eventhub_core::config::AppConfig;
use eventhub_core::error::AppError;
use eventhub_core::traits::cache::CacheProvider;
use eventhub_core::traits::clock::{Clock, SystemClock};
use eventhub_database::repositories::{
    EventRepository, NotificationRepository, PgEventRepository, PgNotificationRepository,
    PgUserRepository, UserRepository,
};
use eventhub_database::{DatabasePool, MemoryDatabase};
use eventhub_delivery::telegram::{BotApi, SubscriptionBot, TelegramChannel};
use eventhub_delivery::{CompositeChannel, DeliveryChannel, RecipientRegistry};
use eventhub_service::{EventStore, NotificationService};
use eventhub_worker::LifecycleScheduler;

/// Command line options.
#[derive(Debug, Parser)]
#[command(name = "eventhub-server", version, about = "EventHub lifecycle scheduler")]
struct Args {
    /// Configuration overlay to load from `config/<env>.toml`.
    #[arg(long, env = "EVENTHUB_ENV", default_value = "development")]
    env: String,

    /// Run a single scheduler tick and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(&args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %args.env, "Configuration loaded");

    if let Err(e) = run(config, args.once).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Repositories backing the services.
struct Repositories {
    events: Arc<dyn EventRepository>,
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    pool: Option<DatabasePool>,
}

async fn open_repositories(config: &AppConfig) -> Result<Repositories, AppError> {
    match config.database.provider.as_str() {
        "postgres" => {
            tracing::info!("Connecting to database...");
            let db_pool = DatabasePool::connect(&config.database).await?;

            if config.database.run_migrations {
                tracing::info!("Running database migrations...");
                eventhub_database::migration::run_migrations(db_pool.pool()).await?;
                tracing::info!("Database migrations complete");
            }

            Ok(Repositories {
                events: Arc::new(PgEventRepository::new(db_pool.pool().clone())),
                notifications: Arc::new(PgNotificationRepository::new(db_pool.pool().clone())),
                users: Arc::new(PgUserRepository::new(db_pool.pool().clone())),
                pool: Some(db_pool),
            })
        }
        _ => {
            tracing::warn!("Using in-process store, data is lost on exit");
            let db = MemoryDatabase::new();
            Ok(Repositories {
                events: Arc::new(db.clone()),
                notifications: Arc::new(db.clone()),
                users: Arc::new(db),
                pool: None,
            })
        }
    }
}

/// Main server run function
async fn run(config: AppConfig, once: bool) -> Result<(), AppError> {
    tracing::info!("Starting EventHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Durable store ────────────────────────────────────
    let repos = open_repositories(&config).await?;

    // ── Step 2: Initialize cache ─────────────────────────────────
    tracing::info!(provider = %config.cache.provider, "Initializing cache...");
    let cache = Arc::new(CacheManager::new(&config.cache).await?);
    match cache.health_check().await {
        Ok(true) => tracing::info!("Cache initialized"),
        Ok(false) => tracing::warn!("Cache unhealthy, reads fall back to the durable store"),
        Err(e) => tracing::warn!(error = %e, "Cache health check failed, reads fall back to the durable store"),
    }
    if repos.pool.is_none() {
        // Entries from an earlier run would describe events this store never had.
        if let Err(e) = cache.flush_all().await {
            tracing::warn!(error = %e, "Failed to flush cache left by a previous run");
        }
    }

    // ── Step 3: Initialize services ──────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let event_store = Arc::new(EventStore::new(
        Arc::clone(&repos.events),
        Arc::clone(&cache),
        Arc::clone(&clock),
    ));
    let notification_service = Arc::new(NotificationService::new(
        Arc::clone(&repos.notifications),
        Arc::clone(&clock),
    ));
    tracing::info!("Services initialized");

    // ── Step 4: Delivery channels ────────────────────────────────
    let registry = Arc::new(RecipientRegistry::new());
    let mut channels = CompositeChannel::new();
    let mut bot = None;

    if config.delivery.telegram.enabled {
        tracing::info!("Initializing Telegram delivery...");
        let api = Arc::new(BotApi::new(&config.delivery.telegram)?);
        match api.get_me().await {
            Ok(me) => tracing::info!(bot = ?me.username, "Telegram bot authorized"),
            Err(e) => tracing::warn!(error = %e, "Telegram bot check failed, continuing"),
        }

        channels = channels.with_channel(Arc::new(TelegramChannel::new(
            api.clone(),
            Arc::clone(&registry),
            Arc::clone(&repos.users),
            Duration::from_secs(config.delivery.telegram.request_timeout_seconds),
        )
        .with_max_concurrent_sends(config.delivery.telegram.max_concurrent_sends)));

        if config.delivery.telegram.poll_updates {
            bot = Some(SubscriptionBot::new(
                api,
                Arc::clone(&repos.users),
                Arc::clone(&registry),
                config.delivery.telegram.poll_timeout_seconds,
            ));
        }
    } else {
        tracing::info!("Telegram delivery disabled");
    }

    let channel: Arc<dyn DeliveryChannel> = Arc::new(channels);
    let scheduler = LifecycleScheduler::new(
        Arc::clone(&event_store),
        Arc::clone(&notification_service),
        channel,
        Arc::clone(&clock),
        config.scheduler.clone(),
    );

    if once {
        let report = scheduler.tick_at(clock.now()).await;
        tracing::info!(
            approached = report.approached,
            started = report.started,
            failed = report.failed,
            skipped = report.skipped,
            "Single tick complete"
        );
        if let Some(pool) = &repos.pool {
            pool.close().await;
        }
        return Ok(());
    }

    // ── Step 5: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles: Vec<(&str, JoinHandle<()>)> = Vec::new();

    // ── Step 6: Start subscription bot ───────────────────────────
    if let Some(bot) = bot {
        let bot_cancel = shutdown_rx.clone();
        handles.push((
            "subscription bot",
            tokio::spawn(async move { bot.run(bot_cancel).await }),
        ));
        tracing::info!("Subscription bot started");
    }

    // ── Step 7: Start lifecycle scheduler ────────────────────────
    if config.scheduler.enabled {
        let scheduler_cancel = shutdown_rx.clone();
        handles.push((
            "lifecycle scheduler",
            tokio::spawn(async move { scheduler.run(scheduler_cancel).await }),
        ));
    } else {
        tracing::info!("Lifecycle scheduler disabled");
    }

    // ── Step 8: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    tracing::info!("Waiting for background tasks to complete...");
    for (name, handle) in handles {
        match tokio::time::timeout(Duration::from_secs(30), handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task panicked"),
            Err(_) => tracing::warn!(task = name, "Background task did not stop in time"),
        }
    }

    if let Some(pool) = &repos.pool {
        pool.close().await;
    }

    tracing::info!("EventHub shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
