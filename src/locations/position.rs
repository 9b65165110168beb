//! Device position via IP geolocation (ip-api.com response format).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::models::Location;

const FALLBACK_LIVE_NAME: &str = "Current location";

#[derive(Error, Debug)]
pub enum PositionError {
    #[error("Position lookup failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Position unavailable: {0}")]
    Unavailable(String),
}

/// Resolves where the device currently is
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn locate(&self) -> Result<Location, PositionError>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
}

pub struct IpPositionClient {
    client: Client,
    url: String,
}

impl IpPositionClient {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl PositionSource for IpPositionClient {
    async fn locate(&self) -> Result<Location, PositionError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PositionError::Unavailable(format!(
                "lookup returned {}",
                status
            )));
        }

        let body: IpApiResponse = response.json().await?;
        if body.status != "success" {
            return Err(PositionError::Unavailable(
                body.message.unwrap_or_else(|| body.status.clone()),
            ));
        }

        let (Some(lat), Some(lon)) = (body.lat, body.lon) else {
            return Err(PositionError::Unavailable(
                "response has no coordinates".to_string(),
            ));
        };

        let name = body
            .city
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| FALLBACK_LIVE_NAME.to_string());

        tracing::info!(name = %name, lat = %lat, lon = %lon, "Resolved device position");
        Ok(Location::live(name, lat, lon))
    }
}
