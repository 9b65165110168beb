use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Open-Meteo Forecast API Response (Internal)
// Arrays under `hourly` are index-aligned; nulls appear past the model horizon
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OpenMeteoResponse {
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub utc_offset_seconds: i32,
    pub hourly: Option<RawHourly>,
    pub current_weather: Option<RawCurrentWeather>,
}

#[derive(Debug, Deserialize)]
pub struct RawHourly {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub precipitation_probability: Vec<Option<f64>>,
    pub weather_code: Vec<Option<u8>>,
}

#[derive(Debug, Deserialize)]
pub struct RawCurrentWeather {
    pub time: String,
    pub temperature: f64,
    pub windspeed: f64,
    pub winddirection: f64,
    pub weathercode: u8,
}

// ============================================================================
// Weather series (what the deriver consumes)
// ============================================================================

/// One hour of forecast data, timestamped in the location's local time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub time: NaiveDateTime,
    pub temperature: f64,
    /// Probability of precipitation, 0-100
    pub precipitation_probability: u8,
    /// WMO weather code
    pub weather_code: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSnapshot {
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub weather_code: u8,
    pub condition: WeatherCondition,
}

/// Hourly forecast plus the optional current conditions for one location.
/// Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSeries {
    pub timezone: String,
    pub utc_offset_seconds: i32,
    pub hourly: Vec<HourlySample>,
    pub current: Option<CurrentSnapshot>,
}

impl WeatherSeries {
    /// Convert an instant into the series' local wall-clock time
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match FixedOffset::east_opt(self.utc_offset_seconds) {
            Some(offset) => now.with_timezone(&offset).naive_local(),
            None => now.naive_utc(),
        }
    }
}

// ============================================================================
// Derived views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub offset_hours: u32,
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub precipitation_probability: u8,
    pub weather_code: u8,
    pub condition: WeatherCondition,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub time: NaiveDateTime,
    pub label: String,
    pub temperature: f64,
    pub precipitation_probability: u8,
    pub weather_code: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMode {
    /// Samples between now and now + horizon
    Rolling { horizon_hours: u32 },
    /// Every sample of one calendar day
    SingleDay(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub max_temperature: f64,
    pub min_temperature: f64,
    pub max_precipitation_probability: u8,
    pub dominant_code: u8,
    pub condition: WeatherCondition,
    pub rain: bool,
}

/// Payload for a rain notification on one location and day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainNotice {
    pub key: String,
    pub location_id: String,
    pub location_name: String,
    pub date: NaiveDate,
    pub date_label: String,
    pub max_precipitation_probability: u8,
    pub rain_codes: Vec<u8>,
}

// ============================================================================
// Condition codes
// ============================================================================

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Showers,
    Thunderstorm,
}

impl WeatherCondition {
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: u8) -> Self {
        match code {
            0 => Self::Clear,
            1 | 2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 | 66 | 67 => Self::Sleet,
            61 | 63 => Self::Rain,
            65 => Self::HeavyRain,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            80..=82 => Self::Showers,
            95..=99 => Self::Thunderstorm,
            _ => Self::Clear,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Showers => "Showers",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Fog => "cloud_fog",
            Self::Drizzle | Self::Rain | Self::HeavyRain | Self::Showers => "cloud_rain",
            Self::Snow | Self::Sleet => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
        }
    }
}
