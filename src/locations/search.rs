use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::models::Location;
use crate::cache::{SearchCache, SearchKey};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Failed to search places: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Geocoding API error: {0}")]
    ApiError(String),
}

/// Place lookup by free-text name
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, name: &str) -> Result<Vec<Location>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    id: u64,
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    admin1: Option<String>,
}

impl From<GeocodingResult> for Location {
    fn from(r: GeocodingResult) -> Self {
        // "Springfield, Illinois, United States" disambiguates same-named places
        let mut name = r.name;
        for part in [r.admin1, r.country].into_iter().flatten() {
            if !part.is_empty() && part != name {
                name.push_str(", ");
                name.push_str(&part);
            }
        }

        Location {
            id: r.id.to_string(),
            name,
            latitude: r.latitude,
            longitude: r.longitude,
            is_live: false,
        }
    }
}

/// Open-Meteo geocoding client. Results are cached for 24 hours.
pub struct OpenMeteoGeocoder {
    client: Client,
    url: String,
    language: String,
    limit: u8,
    cache: SearchCache,
}

impl OpenMeteoGeocoder {
    pub fn new(client: Client, url: &str, language: &str, limit: u8, cache: SearchCache) -> Self {
        Self {
            client,
            url: url.to_string(),
            language: language.to_string(),
            limit,
            cache,
        }
    }
}

#[async_trait]
impl PlaceSearch for OpenMeteoGeocoder {
    async fn search(&self, name: &str) -> Result<Vec<Location>, SearchError> {
        let Some(cache_key) = SearchKey::new(name, &self.language, self.limit) else {
            return Ok(Vec::new());
        };

        if let Some(cached) = self.cache.lookup(&cache_key) {
            tracing::debug!(name = %name, "Place search cache hit");
            return Ok(cached);
        }

        tracing::debug!(name = %name, "Place search cache miss");

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("name", name.trim().to_string()),
                ("count", self.limit.to_string()),
                ("language", self.language.clone()),
                ("format", "json".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!("{}: {}", status, text)));
        }

        let body: GeocodingResponse = response.json().await?;
        let places: Vec<Location> = body
            .results
            .into_iter()
            .take(usize::from(self.limit))
            .map(Location::from)
            .collect();

        self.cache.store(cache_key, places.clone());
        Ok(places)
    }
}
