use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SessionError;
use crate::forecast::derive::{
    build_trend_series, resolve_day_hourly, resolve_offset_points, summarize_day,
};
use crate::forecast::models::{
    CurrentSnapshot, DaySummary, ForecastPoint, HourlySample, TrendMode, TrendPoint,
};
use crate::forecast::{ForecastError, WeatherSeries};
use crate::locations::Location;

/// What point in time the view is focused on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeAnchor {
    /// Hours ahead of now
    Offset { hours: u32 },
    /// A whole calendar day in the location's time zone
    Day { date: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    FetchFailed,
    PositionFallback,
    NotificationsUnavailable,
    NotificationsDenied,
}

/// Dismissible message for the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub location_id: String,
    pub series: WeatherSeries,
    pub fetched_at: DateTime<Utc>,
}

/// Handed out when a fetch starts. Only the ticket of the latest
/// generation may apply its result.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub generation: u64,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed,
    /// A newer fetch started meanwhile; result discarded
    Stale,
}

/// Everything the presentation layer needs for one render
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub location: Option<Location>,
    pub anchor: TimeAnchor,
    pub loading: bool,
    /// Location the displayed data belongs to; differs from `location`
    /// while a fetch for a new selection is pending or has failed
    pub data_location_id: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub local_time: Option<NaiveDateTime>,
    pub current: Option<CurrentSnapshot>,
    pub points: Vec<ForecastPoint>,
    pub day: Option<NaiveDate>,
    pub day_hourly: Vec<HourlySample>,
    pub trend: Vec<TrendPoint>,
    pub summary: Option<DaySummary>,
    pub notices: Vec<Notice>,
}

/// Explicit per-user state: selection, anchor, fetch generation, data and
/// notices. Owned by the session controller.
#[derive(Debug)]
pub struct Session {
    selected: Option<Location>,
    anchor: TimeAnchor,
    generation: u64,
    loading: bool,
    loaded: Option<LoadedSeries>,
    notices: Vec<Notice>,
    next_notice_id: u64,
    default_offset_hours: u32,
}

impl Session {
    pub fn new(default_offset_hours: u32) -> Self {
        Self {
            selected: None,
            anchor: TimeAnchor::Offset {
                hours: default_offset_hours.max(1),
            },
            generation: 0,
            loading: false,
            loaded: None,
            notices: Vec::new(),
            next_notice_id: 1,
            default_offset_hours,
        }
    }

    #[cfg(test)]
    pub fn anchor(&self) -> TimeAnchor {
        self.anchor
    }

    #[cfg(test)]
    pub fn loaded(&self) -> Option<&LoadedSeries> {
        self.loaded.as_ref()
    }

    fn begin_fetch(&mut self, location: Location) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        FetchTicket {
            generation: self.generation,
            location,
        }
    }

    /// Select a location, reset the anchor and start a fetch
    pub fn select(&mut self, location: Location) -> FetchTicket {
        self.anchor = TimeAnchor::Offset {
            hours: location.clamp_offset(self.default_offset_hours),
        };
        self.selected = Some(location.clone());
        self.begin_fetch(location)
    }

    /// Start a fetch for the current selection
    pub fn refresh(&mut self) -> Option<FetchTicket> {
        let location = self.selected.clone()?;
        Some(self.begin_fetch(location))
    }

    /// Apply a finished fetch if it is still the latest one. Failures keep
    /// previously loaded data and raise a notice.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<WeatherSeries, ForecastError>,
        fetched_at: DateTime<Utc>,
    ) -> FetchOutcome {
        if ticket.generation != self.generation {
            return FetchOutcome::Stale;
        }

        self.loading = false;
        match result {
            Ok(series) => {
                self.loaded = Some(LoadedSeries {
                    location_id: ticket.location.id.clone(),
                    series,
                    fetched_at,
                });
                FetchOutcome::Applied
            }
            Err(e) => {
                self.push_notice(
                    NoticeKind::FetchFailed,
                    format!("Could not load weather for {}: {}", ticket.location.name, e),
                );
                FetchOutcome::Failed
            }
        }
    }

    /// Offsets are clamped to the selected location's horizon
    pub fn set_anchor(&mut self, anchor: TimeAnchor) -> Result<TimeAnchor, SessionError> {
        let location = self
            .selected
            .as_ref()
            .ok_or(SessionError::NoLocationSelected)?;

        self.anchor = match anchor {
            TimeAnchor::Offset { hours } => TimeAnchor::Offset {
                hours: location.clamp_offset(hours),
            },
            day @ TimeAnchor::Day { .. } => day,
        };
        Ok(self.anchor)
    }

    pub fn push_notice(&mut self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        self.notices.push(Notice {
            id,
            kind,
            message: message.into(),
        });
        id
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn view(&self, now: DateTime<Utc>) -> SessionView {
        let mut view = SessionView {
            location: self.selected.clone(),
            anchor: self.anchor,
            loading: self.loading,
            data_location_id: None,
            fetched_at: None,
            timezone: None,
            local_time: None,
            current: None,
            points: Vec::new(),
            day: None,
            day_hourly: Vec::new(),
            trend: Vec::new(),
            summary: None,
            notices: self.notices.clone(),
        };

        let (Some(location), Some(loaded)) = (&self.selected, &self.loaded) else {
            return view;
        };
        let series = &loaded.series;
        let local_now = series.local_time(now);

        let day = match self.anchor {
            TimeAnchor::Offset { hours } => {
                view.points = resolve_offset_points(series, local_now, hours);
                view.trend = build_trend_series(
                    series,
                    local_now,
                    TrendMode::Rolling {
                        horizon_hours: location.trend_horizon_hours(),
                    },
                );
                local_now.date()
            }
            TimeAnchor::Day { date } => {
                view.trend = build_trend_series(series, local_now, TrendMode::SingleDay(date));
                date
            }
        };

        view.day_hourly = resolve_day_hourly(series, day);
        view.summary = summarize_day(&view.day_hourly);
        view.day = Some(day);
        view.data_location_id = Some(loaded.location_id.clone());
        view.fetched_at = Some(loaded.fetched_at);
        view.timezone = Some(series.timezone.clone());
        view.local_time = Some(local_now);
        view.current = series.current.clone();
        view
    }
}
