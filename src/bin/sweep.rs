//! One-shot purge of `Pending_Payment` bookings whose payment window
//! lapsed. Meant for cron when the server's own sweeper is not running.

use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use localynk::{
    config::Settings,
    repository::SqliteBookingRepository,
    service::SweepService,
};

#[derive(Parser, Debug)]
#[command(name = "sweep", about = "Delete unpaid bookings older than the payment timeout")]
struct Args {
    /// Overrides database.url from the configuration.
    #[arg(long)]
    database_url: Option<String>,

    /// Overrides booking.pending_payment_timeout_minutes.
    #[arg(long)]
    older_than_minutes: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "localynk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    let database_url = args.database_url.unwrap_or(settings.database.url);
    let minutes = args
        .older_than_minutes
        .unwrap_or(settings.booking.pending_payment_timeout_minutes);
    if minutes < 0 {
        anyhow::bail!("--older-than-minutes must not be negative");
    }

    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let sweeper = SweepService::new(Arc::new(SqliteBookingRepository::new(db_pool)));
    let purged = sweeper.purge_stale_pending(Duration::minutes(minutes)).await?;

    println!("Purged {} stale booking(s) older than {} minutes", purged, minutes);
    Ok(())
}
