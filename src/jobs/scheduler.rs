use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::AppConfig;
use crate::jobs::{dispatch, mailer::Mailer, reminders};

const DISPATCH_BATCH: i64 = 200;

/// Run reminders then email dispatch on a fixed interval.
/// The first pass happens immediately.
pub fn spawn(pool: PgPool, mailer: Arc<dyn Mailer>, config: &'static AppConfig) -> JoinHandle<()> {
    let period = Duration::from_secs(config.scheduler.interval_secs.max(60));
    tracing::info!("Scheduler enabled, running every {:?}", period);

    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let today = Utc::now().date_naive();

            if let Err(e) = reminders::run(&pool, &config.scheduler, today).await {
                tracing::error!("Scheduled reminders failed: {}", e);
            }
            if let Err(e) = dispatch::run(&pool, Arc::clone(&mailer), &config.email.app_base_url, DISPATCH_BATCH).await {
                tracing::error!("Scheduled email dispatch failed: {}", e);
            }
        }
    })
}
