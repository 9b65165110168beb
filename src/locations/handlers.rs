use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Location;
use crate::error::HttpError;
use crate::impl_into_response;
use crate::storage::StorageError;
use crate::AppState;

#[derive(Error, Debug)]
pub enum LocationsError {
    #[error("Invalid location: {0}")]
    Invalid(String),

    #[error("Saved location not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl HttpError for LocationsError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Invalid(_) => Some("INVALID_LOCATION"),
            Self::NotFound(_) => Some("LOCATION_NOT_FOUND"),
            Self::Storage(_) => Some("STORAGE_ERROR"),
        }
    }
}

impl_into_response!(LocationsError);

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LocationListResponse {
    pub locations: Vec<Location>,
    pub count: usize,
}

/// Search places by name. Lookup failures yield an empty list.
/// GET /search?name=
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Location>> {
    match state.places.search(&query.name).await {
        Ok(places) => Json(places),
        Err(e) => {
            tracing::warn!(query = %query.name, error = %e, "Place search failed");
            Json(Vec::new())
        }
    }
}

/// GET /locations
pub async fn list_locations(State(state): State<AppState>) -> Json<LocationListResponse> {
    let locations = state.locations.list().await;
    Json(LocationListResponse {
        count: locations.len(),
        locations,
    })
}

/// Save (or update) a location. A live position is saved as a fixed place.
/// POST /locations
pub async fn add_location(
    State(state): State<AppState>,
    Json(location): Json<Location>,
) -> Result<(StatusCode, Json<Location>), LocationsError> {
    location.validate().map_err(LocationsError::Invalid)?;
    let location = location.to_saved();

    state.locations.add(location.clone()).await?;
    tracing::info!(id = %location.id, name = %location.name, "Location saved");

    Ok((StatusCode::CREATED, Json(location)))
}

/// DELETE /locations/{id}
pub async fn remove_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, LocationsError> {
    if state.locations.remove(&id).await? {
        tracing::info!(id = %id, "Location removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(LocationsError::NotFound(id))
    }
}
