use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{SessionError, SessionView, TimeAnchor};
use crate::locations::Location;
use crate::AppState;

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.controller.view().await)
}

/// Select a location given in full (e.g. a search result)
/// POST /session/select
pub async fn select(
    State(state): State<AppState>,
    Json(location): Json<Location>,
) -> Result<Json<SessionView>, SessionError> {
    state.controller.select(location).await.map(Json)
}

/// POST /session/select/{id}
pub async fn select_saved(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, SessionError> {
    state.controller.select_saved(&id).await.map(Json)
}

/// Resolve the device position and select it
/// POST /session/locate
pub async fn locate(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.controller.locate().await)
}

/// POST /session/refresh
pub async fn refresh(State(state): State<AppState>) -> Result<Json<SessionView>, SessionError> {
    state.controller.refresh().await.map(Json)
}

/// Switch between an hour offset and a calendar day
/// PUT /session/anchor
pub async fn set_anchor(
    State(state): State<AppState>,
    Json(anchor): Json<TimeAnchor>,
) -> Result<Json<SessionView>, SessionError> {
    state.controller.set_anchor(anchor).await.map(Json)
}

/// DELETE /session/notices/{id}
pub async fn dismiss_notice(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, SessionError> {
    state.controller.dismiss_notice(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
