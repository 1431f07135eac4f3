use std::sync::Arc;

use chrono::Duration;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use localynk::{
    api,
    config::Settings,
    notifications::{AlertStoreSink, LogSink, NotificationManager},
    payments::{CheckoutGateway, PayMongoClient},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "localynk=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Localynk on {}:{}", settings.server.host, settings.server.port);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let notifications = Arc::new(NotificationManager::new());
    notifications.register(Arc::new(LogSink)).await;
    notifications
        .register(Arc::new(AlertStoreSink::new(db_pool.clone())))
        .await;

    let gateway: Option<Arc<dyn CheckoutGateway>> = match PayMongoClient::from_config(&settings.paymongo) {
        Some(client) => {
            tracing::info!("PayMongo payment processing enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("PayMongo payment processing disabled");
            None
        }
    };

    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        gateway,
        notifications,
        &settings,
    ));

    spawn_sweeper(service_context.clone(), &settings);

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically reclaims unpaid bookings and expired sessions.
fn spawn_sweeper(context: Arc<ServiceContext>, settings: &Settings) {
    let timeout = Duration::minutes(settings.booking.pending_payment_timeout_minutes);
    let every = std::time::Duration::from_secs(settings.booking.sweep_interval_seconds.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;

            if let Err(e) = context.sweep_service.purge_stale_pending(timeout).await {
                tracing::error!("Stale booking sweep failed: {}", e);
            }
            match context.auth_service.cleanup_expired_sessions().await {
                Ok(n) if n > 0 => tracing::debug!("Removed {} expired sessions", n),
                Ok(_) => {}
                Err(e) => tracing::error!("Session cleanup failed: {}", e),
            }
        }
    });
}
