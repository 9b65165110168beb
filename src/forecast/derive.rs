//! Forecast derivation: turns a raw hourly series into offset snapshots,
//! trend series, day summaries and rain notification decisions.
//!
//! Everything here is pure. Callers own the session state (selected
//! location, anchor, notified keys) and pass it in.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use indexmap::IndexSet;

use super::models::{
    DaySummary, ForecastPoint, HourlySample, RainNotice, TrendMode, TrendPoint, WeatherCondition,
    WeatherSeries,
};
use crate::locations::Location;

/// Offsets always shown next to the user-selected one
pub const FIXED_OFFSETS: [u32; 3] = [1, 2, 6];

/// Codes at or above this value count as rain for summaries and notifications.
/// This also covers snow, showers and thunderstorms.
pub const RAIN_CLASS_MIN_CODE: u8 = 51;

/// Precipitation probability that flags a day as rainy on its own
pub const RAIN_PROBABILITY_THRESHOLD: u8 = 50;

const DAYTIME_START_HOUR: u32 = 6;
const DAYTIME_END_HOUR: u32 = 18;

/// Two timestamps share an hour bucket when date and hour match
fn same_hour(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date() && a.hour() == b.hour()
}

pub fn is_rain_class(code: u8) -> bool {
    code >= RAIN_CLASS_MIN_CODE
}

fn offset_label(offset_hours: u32) -> String {
    if offset_hours == 1 {
        "In 1 hour".to_string()
    } else {
        format!("In {} hours", offset_hours)
    }
}

/// Find the sample in the same calendar hour as `now + offset_hours`.
///
/// Returns `None` when the target hour is outside the fetched horizon.
/// No clamping happens here; callers restrict the offset range.
pub fn resolve_offset_point(
    series: &WeatherSeries,
    now: NaiveDateTime,
    offset_hours: u32,
) -> Option<ForecastPoint> {
    let target = now.checked_add_signed(TimeDelta::hours(i64::from(offset_hours)))?;
    let sample = series.hourly.iter().find(|s| same_hour(s.time, target))?;

    Some(ForecastPoint {
        offset_hours,
        time: sample.time,
        temperature: sample.temperature,
        precipitation_probability: sample.precipitation_probability,
        weather_code: sample.weather_code,
        condition: WeatherCondition::from_wmo_code(sample.weather_code),
        label: offset_label(offset_hours),
    })
}

/// Resolve the fixed offsets plus the selected one, in that order.
/// Missing points are dropped, duplicates are kept.
pub fn resolve_offset_points(
    series: &WeatherSeries,
    now: NaiveDateTime,
    selected_offset: u32,
) -> Vec<ForecastPoint> {
    FIXED_OFFSETS
        .iter()
        .copied()
        .chain(std::iter::once(selected_offset))
        .filter_map(|offset| resolve_offset_point(series, now, offset))
        .collect()
}

/// All samples on `day`, in series order
pub fn resolve_day_hourly(series: &WeatherSeries, day: NaiveDate) -> Vec<HourlySample> {
    series
        .hourly
        .iter()
        .filter(|s| s.time.date() == day)
        .cloned()
        .collect()
}

pub fn build_trend_series(
    series: &WeatherSeries,
    now: NaiveDateTime,
    mode: TrendMode,
) -> Vec<TrendPoint> {
    match mode {
        TrendMode::Rolling { horizon_hours } => {
            let end = now
                .checked_add_signed(TimeDelta::hours(i64::from(horizon_hours)))
                .unwrap_or(NaiveDateTime::MAX);
            series
                .hourly
                .iter()
                .filter(|s| s.time >= now && s.time <= end)
                .map(|s| trend_point(s, "%a %H:%M"))
                .collect()
        }
        TrendMode::SingleDay(day) => resolve_day_hourly(series, day)
            .iter()
            .map(|s| trend_point(s, "%H:%M"))
            .collect(),
    }
}

fn trend_point(sample: &HourlySample, label_format: &str) -> TrendPoint {
    TrendPoint {
        time: sample.time,
        label: sample.time.format(label_format).to_string(),
        temperature: sample.temperature,
        precipitation_probability: sample.precipitation_probability,
        weather_code: sample.weather_code,
    }
}

fn max_precipitation(day_hourly: &[HourlySample]) -> u8 {
    day_hourly
        .iter()
        .map(|s| s.precipitation_probability)
        .max()
        .unwrap_or(0)
}

fn rain_expected(day_hourly: &[HourlySample], max_precip: u8) -> bool {
    max_precip >= RAIN_PROBABILITY_THRESHOLD
        || day_hourly.iter().any(|s| is_rain_class(s.weather_code))
}

/// Summarize one day of samples. Empty input has no summary.
pub fn summarize_day(day_hourly: &[HourlySample]) -> Option<DaySummary> {
    let first = day_hourly.first()?;

    let (min_temperature, max_temperature) = day_hourly.iter().fold(
        (first.temperature, first.temperature),
        |(min, max), s| (min.min(s.temperature), max.max(s.temperature)),
    );
    let max_precipitation_probability = max_precipitation(day_hourly);

    // Midpoint of the daytime window stands in for the whole day
    let daytime: Vec<&HourlySample> = day_hourly
        .iter()
        .filter(|s| (DAYTIME_START_HOUR..=DAYTIME_END_HOUR).contains(&s.time.hour()))
        .collect();
    let dominant_code = daytime
        .get(daytime.len() / 2)
        .map_or(first.weather_code, |s| s.weather_code);

    Some(DaySummary {
        date: first.time.date(),
        max_temperature,
        min_temperature,
        max_precipitation_probability,
        dominant_code,
        condition: WeatherCondition::from_wmo_code(dominant_code),
        rain: rain_expected(day_hourly, max_precipitation_probability),
    })
}

/// Dedup key recorded once a location has been notified for a day
pub fn notification_key(location_id: &str, day: NaiveDate) -> String {
    format!("{}_{}", location_id, day.format("%Y-%m-%d"))
}

/// "today", "tomorrow", otherwise a weekday date like "Saturday, October 18"
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    match (day - today).num_days() {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        _ => day.format("%A, %B %-d").to_string(),
    }
}

/// Decide whether `location` should get a rain notification for `day`.
///
/// Returns `None` when the key was already recorded or no rain is expected.
/// The caller must record `notice.key` before dispatching.
pub fn should_notify(
    day_hourly: &[HourlySample],
    location: &Location,
    day: NaiveDate,
    today: NaiveDate,
    already_notified: &IndexSet<String>,
) -> Option<RainNotice> {
    let key = notification_key(&location.id, day);
    if already_notified.contains(&key) {
        return None;
    }

    let max_precip = max_precipitation(day_hourly);
    if day_hourly.is_empty() || !rain_expected(day_hourly, max_precip) {
        return None;
    }

    let mut rain_codes: Vec<u8> = day_hourly
        .iter()
        .map(|s| s.weather_code)
        .filter(|&code| is_rain_class(code))
        .collect();
    rain_codes.sort_unstable();
    rain_codes.dedup();

    Some(RainNotice {
        key,
        location_id: location.id.clone(),
        location_name: location.name.clone(),
        date: day,
        date_label: day_label(day, today),
        max_precipitation_probability: max_precip,
        rain_codes,
    })
}
