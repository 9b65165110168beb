use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use thiserror::Error;

use super::models::*;
use crate::locations::Location;

const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability,weather_code";
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Failed to fetch forecast: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Forecast API error: {0}")]
    ApiError(String),

    #[error("Invalid forecast response: {0}")]
    InvalidResponse(String),
}

/// Source of hourly weather series for a location
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, location: &Location) -> Result<WeatherSeries, ForecastError>;
}

/// Open-Meteo forecast client (no API key required)
pub struct OpenMeteoClient {
    client: Client,
    forecast_url: String,
}

impl OpenMeteoClient {
    pub fn new(client: Client, forecast_url: &str) -> Self {
        Self {
            client,
            forecast_url: forecast_url.to_string(),
        }
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch(&self, location: &Location) -> Result<WeatherSeries, ForecastError> {
        tracing::debug!(
            location = %location.name,
            lat = %location.latitude,
            lon = %location.longitude,
            days = location.forecast_days(),
            "Fetching forecast"
        );

        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("current_weather", "true".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", location.forecast_days().to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "Received forecast response");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ForecastError::ApiError(format!("{}: {}", status, text)));
        }

        let data: OpenMeteoResponse = response.json().await?;
        build_series(data)
    }
}

fn parse_local_time(raw: &str) -> Result<NaiveDateTime, ForecastError> {
    NaiveDateTime::parse_from_str(raw, LOCAL_TIME_FORMAT)
        .map_err(|e| ForecastError::InvalidResponse(format!("bad timestamp {:?}: {}", raw, e)))
}

/// Convert the raw column arrays into index-aligned samples.
///
/// Rows missing a temperature or code are dropped whole so the remaining
/// fields stay aligned.
pub fn build_series(data: OpenMeteoResponse) -> Result<WeatherSeries, ForecastError> {
    let hourly = match data.hourly {
        Some(raw) => {
            let len = raw.time.len();
            if raw.temperature_2m.len() != len
                || raw.precipitation_probability.len() != len
                || raw.weather_code.len() != len
            {
                return Err(ForecastError::InvalidResponse(format!(
                    "hourly arrays differ in length (time={}, temperature={}, precipitation={}, code={})",
                    len,
                    raw.temperature_2m.len(),
                    raw.precipitation_probability.len(),
                    raw.weather_code.len()
                )));
            }

            let mut samples = Vec::with_capacity(len);
            for (i, time) in raw.time.iter().enumerate() {
                let (Some(temperature), Some(weather_code)) =
                    (raw.temperature_2m[i], raw.weather_code[i])
                else {
                    continue;
                };
                let precipitation = raw.precipitation_probability[i]
                    .unwrap_or(0.0)
                    .clamp(0.0, 100.0);
                samples.push(HourlySample {
                    time: parse_local_time(time)?,
                    temperature,
                    precipitation_probability: precipitation.round() as u8,
                    weather_code,
                });
            }
            samples
        }
        None => Vec::new(),
    };

    let current = match data.current_weather {
        Some(c) => Some(CurrentSnapshot {
            time: parse_local_time(&c.time)?,
            temperature: c.temperature,
            wind_speed: c.windspeed,
            wind_direction: c.winddirection,
            weather_code: c.weathercode,
            condition: WeatherCondition::from_wmo_code(c.weathercode),
        }),
        None => None,
    };

    Ok(WeatherSeries {
        timezone: data.timezone,
        utc_offset_seconds: data.utc_offset_seconds,
        hourly,
        current,
    })
}
