use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobBuilder, JobScheduler};

use crate::alerts::RainAlertService;
use crate::forecast::models::RainNotice;
use crate::forecast::WeatherSource;
use crate::session::SessionController;
use crate::storage::LocationStore;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

/// Result of one pass over the saved locations
#[derive(Debug, Default, Serialize)]
pub struct RainCheckSummary {
    pub checked: usize,
    pub failed: Vec<String>,
    pub notified: Vec<RainNotice>,
}

/// Rain check over every saved location
pub struct RainWatch {
    weather: Arc<dyn WeatherSource>,
    locations: Arc<LocationStore>,
    alerts: Arc<RainAlertService>,
    controller: Arc<SessionController>,
}

impl RainWatch {
    pub fn new(
        weather: Arc<dyn WeatherSource>,
        locations: Arc<LocationStore>,
        alerts: Arc<RainAlertService>,
        controller: Arc<SessionController>,
    ) -> Self {
        Self {
            weather,
            locations,
            alerts,
            controller,
        }
    }

    pub async fn run_now(&self) -> RainCheckSummary {
        self.run_at(Utc::now()).await
    }

    /// Check every saved location as of `now`. A failing location is logged
    /// and skipped.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RainCheckSummary {
        let mut summary = RainCheckSummary::default();
        let locations = self.locations.list().await;

        tracing::info!(count = locations.len(), "Running rain check");

        for location in locations {
            let series = match self.weather.fetch(&location).await {
                Ok(series) => series,
                Err(e) => {
                    tracing::error!(location = %location.name, error = %e, "Rain check fetch failed");
                    summary.failed.push(location.id);
                    continue;
                }
            };

            let outcome = self.alerts.check(&location, &series, now).await;
            summary.checked += 1;
            summary.notified.extend(outcome.sent);

            if outcome.permission_revoked {
                self.controller.report_notifications_denied().await;
            }
        }

        summary
    }
}

/// Parse and check a cron expression and timezone before scheduling
pub fn validate_schedule(cron: &str, timezone: &str) -> Result<chrono_tz::Tz, SchedulerError> {
    if Job::new_async(cron, |_, _| Box::pin(async {})).is_err() {
        return Err(SchedulerError::InvalidCron(cron.to_string()));
    }

    timezone
        .parse::<chrono_tz::Tz>()
        .map_err(|_| SchedulerError::InvalidTimezone(timezone.to_string()))
}

/// Runs the rain check on a cron schedule
pub struct SchedulerService {
    scheduler: JobScheduler,
    watch: Arc<RainWatch>,
}

impl SchedulerService {
    pub async fn new(watch: Arc<RainWatch>) -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

        Ok(Self { scheduler, watch })
    }

    pub fn watch(&self) -> &Arc<RainWatch> {
        &self.watch
    }

    pub async fn schedule_rain_check(&self, cron: &str, timezone: &str) -> Result<(), SchedulerError> {
        let tz = validate_schedule(cron, timezone)?;
        let watch = Arc::clone(&self.watch);

        tracing::info!(cron = %cron, timezone = %timezone, "Scheduling rain check");

        let job = JobBuilder::new()
            .with_timezone(tz)
            .with_cron_job_type()
            .with_schedule(cron)
            .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?
            .with_run_async(Box::new(move |_uuid, _lock| {
                let watch = Arc::clone(&watch);
                Box::pin(async move {
                    let summary = watch.run_now().await;
                    tracing::info!(
                        checked = summary.checked,
                        failed = summary.failed.len(),
                        notified = summary.notified.len(),
                        "Scheduled rain check finished"
                    );
                })
            }))
            .build()
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

        Ok(())
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        tracing::info!("Starting scheduler");
        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))
    }
}
