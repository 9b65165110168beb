use axum::{extract::State, Json};

use super::service::RainCheckSummary;
use crate::AppState;

/// Run the rain check over all saved locations now
/// POST /alerts/check
pub async fn run_rain_check(State(state): State<AppState>) -> Json<RainCheckSummary> {
    Json(state.scheduler_service.watch().run_now().await)
}
