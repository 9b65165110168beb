//! Rain alerts: decides, records and dispatches rain notifications.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use indexmap::IndexSet;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::forecast::derive::{resolve_day_hourly, should_notify};
use crate::forecast::models::{RainNotice, WeatherCondition};
use crate::forecast::WeatherSeries;
use crate::locations::Location;
use crate::notifications::{NotificationError, NotificationMessage, Notifier, Priority};
use crate::storage::NotifiedLedger;

/// Today and tomorrow
const LOOKAHEAD_DAYS: u64 = 2;

/// Precipitation probability that raises the push priority
const HIGH_PRIORITY_PRECIP: u8 = 80;

/// Whether notifications may be dispatched in this process.
/// `Denied` is terminal until restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    Unavailable,
    Granted,
    Denied,
}

#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub sent: Vec<RainNotice>,
    /// Set once, on the check where a backend first rejected us
    pub permission_revoked: bool,
}

pub struct RainAlertService {
    notifier: Arc<dyn Notifier>,
    ledger: Arc<NotifiedLedger>,
    permission: RwLock<NotificationPermission>,
}

impl RainAlertService {
    pub fn new(notifier: Arc<dyn Notifier>, ledger: Arc<NotifiedLedger>) -> Self {
        let permission = if notifier.is_configured() {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Unavailable
        };

        Self {
            notifier,
            ledger,
            permission: RwLock::new(permission),
        }
    }

    pub async fn permission(&self) -> NotificationPermission {
        *self.permission.read().await
    }

    /// Check today and tomorrow (location-local) and notify for each rainy
    /// day not yet recorded. The key is persisted before dispatch.
    pub async fn check(
        &self,
        location: &Location,
        series: &WeatherSeries,
        now: DateTime<Utc>,
    ) -> CheckOutcome {
        let mut outcome = CheckOutcome::default();

        if self.permission().await != NotificationPermission::Granted {
            tracing::debug!(location = %location.name, "Notifications not permitted, skipping rain check");
            return outcome;
        }

        let today = series.local_time(now).date();

        for offset in 0..LOOKAHEAD_DAYS {
            let Some(day) = today.checked_add_days(Days::new(offset)) else {
                continue;
            };
            let day_hourly = resolve_day_hourly(series, day);

            let Some(notice) = self
                .ledger
                .claim(|keys| should_notify(&day_hourly, location, day, today, keys))
                .await
            else {
                continue;
            };

            tracing::info!(
                key = %notice.key,
                max_precip = notice.max_precipitation_probability,
                "Rain expected, notifying"
            );

            match self.notifier.send(&rain_message(&notice)).await {
                Ok(()) => outcome.sent.push(notice),
                Err(NotificationError::Rejected(reason)) => {
                    tracing::warn!(reason = %reason, "Notifications rejected, disabling for this session");
                    let mut permission = self.permission.write().await;
                    if *permission == NotificationPermission::Granted {
                        *permission = NotificationPermission::Denied;
                        outcome.permission_revoked = true;
                    }
                    break;
                }
                Err(e) => {
                    tracing::error!(key = %notice.key, error = %e, "Failed to dispatch rain notification");
                }
            }
        }

        outcome
    }
}

/// Human-readable push message for a rain notice
pub fn rain_message(notice: &RainNotice) -> NotificationMessage {
    let mut body = format!(
        "Up to {}% chance of precipitation {}.",
        notice.max_precipitation_probability, notice.date_label
    );

    let conditions: IndexSet<&str> = notice
        .rain_codes
        .iter()
        .map(|&code| WeatherCondition::from_wmo_code(code).description())
        .collect();
    if !conditions.is_empty() {
        let listed: Vec<&str> = conditions.into_iter().collect();
        body.push_str(&format!(" Expect: {}.", listed.join(", ")));
    }

    let priority = if notice.max_precipitation_probability >= HIGH_PRIORITY_PRECIP {
        Priority::High
    } else {
        Priority::Default
    };

    NotificationMessage {
        title: format!("Rain expected {} in {}", notice.date_label, notice.location_name),
        body,
        priority,
        tags: vec!["umbrella".to_string()],
    }
}
