use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::models::{FetchOutcome, FetchTicket, NoticeKind, Session, SessionView, TimeAnchor};
use super::SessionError;
use crate::alerts::{NotificationPermission, RainAlertService};
use crate::forecast::WeatherSource;
use crate::locations::{Location, PositionSource};
use crate::storage::LocationStore;

/// Owns the session and drives fetches for it
pub struct SessionController {
    session: RwLock<Session>,
    weather: Arc<dyn WeatherSource>,
    position: Arc<dyn PositionSource>,
    locations: Arc<LocationStore>,
    alerts: Arc<RainAlertService>,
    fallback: Location,
    clock: fn() -> DateTime<Utc>,
}

impl SessionController {
    pub async fn new(
        weather: Arc<dyn WeatherSource>,
        position: Arc<dyn PositionSource>,
        locations: Arc<LocationStore>,
        alerts: Arc<RainAlertService>,
        fallback: Location,
        default_offset_hours: u32,
    ) -> Self {
        let mut session = Session::new(default_offset_hours);

        if alerts.permission().await == NotificationPermission::Unavailable {
            session.push_notice(
                NoticeKind::NotificationsUnavailable,
                "No notification service configured; rain alerts are disabled",
            );
        }

        Self {
            session: RwLock::new(session),
            weather,
            position,
            locations,
            alerts,
            fallback,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used for views and rain checks
    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn view(&self) -> SessionView {
        self.session.read().await.view((self.clock)())
    }

    /// Select a location and load its forecast
    pub async fn select(&self, location: Location) -> Result<SessionView, SessionError> {
        location.validate().map_err(SessionError::InvalidLocation)?;

        tracing::info!(id = %location.id, name = %location.name, "Selecting location");
        let ticket = self.session.write().await.select(location);
        self.run_fetch(ticket).await;

        Ok(self.view().await)
    }

    pub async fn select_saved(&self, id: &str) -> Result<SessionView, SessionError> {
        let location = self
            .locations
            .get(id)
            .await
            .ok_or_else(|| SessionError::LocationNotFound(id.to_string()))?;
        self.select(location).await
    }

    /// Select the device position, falling back to the first saved location
    /// or the configured default when it cannot be resolved
    pub async fn locate(&self) -> SessionView {
        let location = match self.position.locate().await {
            Ok(location) => location,
            Err(e) => {
                let fallback = match self.locations.first().await {
                    Some(saved) => saved,
                    None => self.fallback.clone(),
                };
                tracing::warn!(error = %e, fallback = %fallback.name, "Position unavailable, using fallback");
                self.session.write().await.push_notice(
                    NoticeKind::PositionFallback,
                    format!(
                        "Could not determine your position; showing {}",
                        fallback.name
                    ),
                );
                fallback
            }
        };

        let ticket = self.session.write().await.select(location);
        self.run_fetch(ticket).await;
        self.view().await
    }

    pub async fn refresh(&self) -> Result<SessionView, SessionError> {
        let ticket = self
            .session
            .write()
            .await
            .refresh()
            .ok_or(SessionError::NoLocationSelected)?;
        self.run_fetch(ticket).await;

        Ok(self.view().await)
    }

    pub async fn set_anchor(&self, anchor: TimeAnchor) -> Result<SessionView, SessionError> {
        let anchor = self.session.write().await.set_anchor(anchor)?;
        tracing::debug!(anchor = ?anchor, "Anchor changed");
        Ok(self.view().await)
    }

    pub async fn dismiss_notice(&self, id: u64) -> Result<(), SessionError> {
        if self.session.write().await.dismiss_notice(id) {
            Ok(())
        } else {
            Err(SessionError::NoticeNotFound(id))
        }
    }

    /// Surface a one-time notice after a backend rejected notifications
    pub async fn report_notifications_denied(&self) {
        self.session.write().await.push_notice(
            NoticeKind::NotificationsDenied,
            "The notification service rejected our credentials; rain alerts are disabled",
        );
    }

    async fn run_fetch(&self, ticket: FetchTicket) {
        let result = self.weather.fetch(&ticket.location).await;
        let fetched_at = (self.clock)();
        let series = result.as_ref().ok().cloned();

        let outcome = self
            .session
            .write()
            .await
            .complete_fetch(&ticket, result, fetched_at);

        match (outcome, series) {
            (FetchOutcome::Applied, Some(series)) => {
                let checked = self.alerts.check(&ticket.location, &series, fetched_at).await;
                if checked.permission_revoked {
                    self.report_notifications_denied().await;
                }
            }
            (FetchOutcome::Stale, _) => {
                tracing::debug!(
                    generation = ticket.generation,
                    location = %ticket.location.name,
                    "Discarding stale forecast response"
                );
            }
            (FetchOutcome::Failed, _) => {
                tracing::warn!(location = %ticket.location.name, "Forecast fetch failed");
            }
            (FetchOutcome::Applied, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::tests::{series_raining_on, FakeNotifier};
    use crate::forecast::{ForecastError, WeatherSeries};
    use crate::locations::PositionError;
    use crate::storage::{JsonStore, NotifiedLedger};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use tokio::sync::Notify;

    struct FakeWeather {
        series: WeatherSeries,
        fail: bool,
        /// Fetches for this location id wait until notified
        gate: Option<(String, Arc<Notify>)>,
    }

    impl FakeWeather {
        fn returning(series: WeatherSeries) -> Self {
            Self {
                series,
                fail: false,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl WeatherSource for FakeWeather {
        async fn fetch(&self, location: &Location) -> Result<WeatherSeries, ForecastError> {
            if let Some((id, gate)) = &self.gate {
                if id == &location.id {
                    gate.notified().await;
                }
            }
            if self.fail {
                return Err(ForecastError::ApiError("503 Service Unavailable".to_string()));
            }
            Ok(self.series.clone())
        }
    }

    struct FakePosition(Option<Location>);

    #[async_trait]
    impl PositionSource for FakePosition {
        async fn locate(&self) -> Result<Location, PositionError> {
            self.0
                .clone()
                .ok_or_else(|| PositionError::Unavailable("denied".to_string()))
        }
    }

    /// Inside the first day of `series_raining_on`
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn place(id: &str) -> Location {
        Location {
            id: id.to_string(),
            name: format!("Place {}", id),
            latitude: 10.0,
            longitude: 20.0,
            is_live: false,
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        controller: SessionController,
        notifier: Arc<FakeNotifier>,
        locations: Arc<LocationStore>,
    }

    async fn harness(
        weather: FakeWeather,
        position: Option<Location>,
        notifier: FakeNotifier,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let ledger = Arc::new(NotifiedLedger::open(store.clone(), today, 30).await);
        let locations = Arc::new(LocationStore::open(store).await);
        let notifier = Arc::new(notifier);
        let alerts = Arc::new(RainAlertService::new(notifier.clone(), ledger));

        let controller = SessionController::new(
            Arc::new(weather),
            Arc::new(FakePosition(position)),
            Arc::clone(&locations),
            alerts,
            place("default"),
            3,
        )
        .await
        .with_clock(fixed_now);

        Harness {
            _dir: dir,
            controller,
            notifier,
            locations,
        }
    }

    #[tokio::test]
    async fn test_select_loads_data() {
        let h = harness(
            FakeWeather::returning(series_raining_on(None)),
            None,
            FakeNotifier::new(true, false),
        )
        .await;

        let view = h.controller.select(place("a")).await.unwrap();
        assert_eq!(view.location.unwrap().id, "a");
        assert_eq!(view.data_location_id.as_deref(), Some("a"));
        assert_eq!(view.anchor, TimeAnchor::Offset { hours: 3 });
        assert!(!view.loading);
        assert_eq!(view.local_time, Some(fixed_now().naive_utc()));
        assert_eq!(view.day, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[tokio::test]
    async fn test_select_rejects_invalid_location() {
        let h = harness(
            FakeWeather::returning(series_raining_on(None)),
            None,
            FakeNotifier::new(true, false),
        )
        .await;

        let mut bad = place("a");
        bad.longitude = 200.0;
        assert!(matches!(
            h.controller.select(bad).await,
            Err(SessionError::InvalidLocation(_))
        ));
    }

    #[tokio::test]
    async fn test_locate_falls_back_with_notice() {
        let h = harness(
            FakeWeather::returning(series_raining_on(None)),
            None,
            FakeNotifier::new(true, false),
        )
        .await;
        h.locations.add(place("saved")).await.unwrap();

        let view = h.controller.locate().await;
        assert_eq!(view.location.unwrap().id, "saved");
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].kind, NoticeKind::PositionFallback);
    }

    #[tokio::test]
    async fn test_locate_without_saved_uses_default() {
        let h = harness(
            FakeWeather::returning(series_raining_on(None)),
            None,
            FakeNotifier::new(true, false),
        )
        .await;

        let view = h.controller.locate().await;
        assert_eq!(view.location.unwrap().id, "default");
    }

    #[tokio::test]
    async fn test_locate_selects_live_position() {
        let h = harness(
            FakeWeather::returning(series_raining_on(None)),
            Some(Location::live("Here", 1.0, 2.0)),
            FakeNotifier::new(true, false),
        )
        .await;

        let view = h.controller.locate().await;
        assert!(view.location.unwrap().is_live);
        assert!(view.notices.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_becomes_notice() {
        let mut weather = FakeWeather::returning(series_raining_on(None));
        weather.fail = true;
        let h = harness(weather, None, FakeNotifier::new(true, false)).await;

        let view = h.controller.select(place("a")).await.unwrap();
        assert!(view.data_location_id.is_none());
        assert_eq!(view.notices[0].kind, NoticeKind::FetchFailed);

        let id = view.notices[0].id;
        h.controller.dismiss_notice(id).await.unwrap();
        assert!(h.controller.view().await.notices.is_empty());
        assert!(matches!(
            h.controller.dismiss_notice(id).await,
            Err(SessionError::NoticeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_requires_selection() {
        let h = harness(
            FakeWeather::returning(series_raining_on(None)),
            None,
            FakeNotifier::new(true, false),
        )
        .await;

        assert!(matches!(
            h.controller.refresh().await,
            Err(SessionError::NoLocationSelected)
        ));
    }

    #[tokio::test]
    async fn test_stale_response_does_not_overwrite_newer_selection() {
        let gate = Arc::new(Notify::new());
        let mut weather = FakeWeather::returning(series_raining_on(None));
        weather.gate = Some(("slow".to_string(), Arc::clone(&gate)));
        let h = harness(weather, None, FakeNotifier::new(true, false)).await;

        let slow = h.controller.select(place("slow"));
        let fast = async {
            tokio::task::yield_now().await;
            let view = h.controller.select(place("fast")).await.unwrap();
            gate.notify_one();
            view
        };
        let (slow_view, fast_view) = tokio::join!(slow, fast);

        assert_eq!(fast_view.data_location_id.as_deref(), Some("fast"));
        let slow_view = slow_view.unwrap();
        assert_eq!(slow_view.location.unwrap().id, "fast");
        assert_eq!(slow_view.data_location_id.as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn test_select_triggers_rain_notification_once() {
        let h = harness(
            FakeWeather::returning(series_raining_on(Some(1))),
            None,
            FakeNotifier::new(true, false),
        )
        .await;

        h.controller.select(place("a")).await.unwrap();
        h.controller.refresh().await.unwrap();

        let titles = h.notifier.sent_titles();
        assert_eq!(titles.len(), 1);
        assert!(titles[0].contains("Place a"));
    }

    #[tokio::test]
    async fn test_unconfigured_notifications_notice_at_start() {
        let h = harness(
            FakeWeather::returning(series_raining_on(None)),
            None,
            FakeNotifier::new(false, false),
        )
        .await;

        let view = h.controller.view().await;
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].kind, NoticeKind::NotificationsUnavailable);
    }

    #[tokio::test]
    async fn test_rejected_notifications_notice_once() {
        let h = harness(
            FakeWeather::returning(series_raining_on(Some(0))),
            None,
            FakeNotifier::new(true, true),
        )
        .await;

        h.controller.select(place("a")).await.unwrap();
        h.controller.select(place("b")).await.unwrap();

        let denied = h
            .controller
            .view()
            .await
            .notices
            .iter()
            .filter(|n| n.kind == NoticeKind::NotificationsDenied)
            .count();
        assert_eq!(denied, 1);
    }
}
