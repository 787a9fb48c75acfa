//! Sends day-before reminders for every event starting tomorrow, then exits.
//!
//! Meant to be run once a day by an external scheduler (cron, k8s CronJob).

use std::sync::Arc;

use confernet_common::config::AppConfig;
use confernet_common::db;
use confernet_notifier::reminder::send_tomorrow_reminders;
use confernet_notifier::{Notifier, transport};
use confernet_store::{DocumentStore, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confernet_notifier=info".into()),
        )
        .json()
        .init();

    tracing::info!("ConferNet reminder run starting...");

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let store: Arc<dyn DocumentStore> = Arc::new(PgStore::new(pool));
    let transport = transport::from_config(&config)?;
    let notifier = Notifier::new(store.clone(), transport);

    match send_tomorrow_reminders(store.as_ref(), &notifier, chrono::Utc::now()).await {
        Ok(summary) => {
            tracing::info!(
                events = summary.events,
                sent = summary.sent,
                failed = summary.failed,
                "Reminder run finished"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Reminder run failed");
        }
    }

    Ok(())
}
