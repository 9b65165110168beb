use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;

use crate::locations::handlers as locations_handlers;
use crate::scheduler::handlers as scheduler_handlers;
use crate::session::handlers as session_handlers;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Place search and saved locations
fn locations_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(locations_handlers::search))
        .route(
            "/locations",
            get(locations_handlers::list_locations).post(locations_handlers::add_location),
        )
        .route(
            "/locations/{id}",
            delete(locations_handlers::remove_location),
        )
}

/// The single interactive session
fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(session_handlers::get_session))
        .route("/session/select", post(session_handlers::select))
        .route("/session/select/{id}", post(session_handlers::select_saved))
        .route("/session/locate", post(session_handlers::locate))
        .route("/session/refresh", post(session_handlers::refresh))
        .route("/session/anchor", put(session_handlers::set_anchor))
        .route(
            "/session/notices/{id}",
            delete(session_handlers::dismiss_notice),
        )
}

fn alerts_routes() -> Router<AppState> {
    Router::new().route("/alerts/check", post(scheduler_handlers::run_rain_check))
}

/// Build the complete application router
pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .merge(locations_routes())
        .merge(session_routes())
        .merge(alerts_routes())
}
