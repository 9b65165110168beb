pub mod derive;
pub mod models;
mod service;

pub use models::WeatherSeries;
pub use service::{ForecastError, OpenMeteoClient, WeatherSource};
