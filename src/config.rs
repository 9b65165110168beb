use config::{Case, Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::locations::Location;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding saved locations and notified keys
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Shown when neither the device position nor a saved location is available
    #[serde(default)]
    pub default_location: DefaultLocation,

    /// Offset selected after switching location
    #[serde(default = "default_offset_hours")]
    pub default_offset_hours: u32,

    /// Notified keys older than this are pruned at startup
    #[serde(default = "default_retention_days")]
    pub notified_retention_days: u32,

    #[serde(default)]
    pub open_meteo: OpenMeteoConfig,

    #[serde(default)]
    pub position: PositionConfig,

    /// Periodic rain check over saved locations
    #[serde(default)]
    pub rain_check: RainCheckConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DefaultLocation {
    #[serde(default = "default_location_id")]
    pub id: String,
    #[serde(default = "default_location_name")]
    pub name: String,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

impl Default for DefaultLocation {
    fn default() -> Self {
        Self {
            id: default_location_id(),
            name: default_location_name(),
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

impl From<DefaultLocation> for Location {
    fn from(d: DefaultLocation) -> Self {
        Location {
            id: d.id,
            name: d.name,
            latitude: d.latitude,
            longitude: d.longitude,
            is_live: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenMeteoConfig {
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    /// Language for place names
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_search_limit")]
    pub search_limit: u8,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            geocoding_url: default_geocoding_url(),
            language: default_language(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PositionConfig {
    /// ip-api compatible endpoint
    #[serde(default = "default_position_url")]
    pub url: String,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            url: default_position_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RainCheckConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Six-field cron expression (with seconds)
    #[serde(default = "default_cron")]
    pub cron: String,

    /// IANA timezone the cron expression is evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for RainCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_cron(),
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub ntfy: Option<NtfyConfig>,
    #[serde(default)]
    pub gotify: Option<GotifyConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NtfyConfig {
    #[serde(default = "default_ntfy_url")]
    pub url: String,
    pub topic: String,
    /// Access token (takes precedence over username/password)
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GotifyConfig {
    pub url: String,
    /// Application token
    pub token: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_offset_hours() -> u32 {
    3
}

fn default_retention_days() -> u32 {
    30
}

fn default_location_id() -> String {
    "default".to_string()
}

fn default_location_name() -> String {
    "London".to_string()
}

fn default_latitude() -> f64 {
    51.5074
}

fn default_longitude() -> f64 {
    -0.1278
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_search_limit() -> u8 {
    5
}

fn default_position_url() -> String {
    "http://ip-api.com/json/".to_string()
}

fn default_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_ntfy_url() -> String {
    "https://ntfy.sh".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config.local").required(false))
            // RAINCHECK_RAIN_CHECK__CRON -> rain_check.cron
            .add_source(
                Environment::with_prefix("RAINCHECK")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(Case::Snake)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
