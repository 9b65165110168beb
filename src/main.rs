mod alerts;
mod cache;
mod config;
mod error;
mod forecast;
mod locations;
mod notifications;
mod routes;
mod scheduler;
mod session;
mod storage;

use axum::{error_handling::HandleErrorLayer, http::StatusCode, BoxError, Router};
use chrono::Utc;
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::alerts::RainAlertService;
use crate::cache::{create_search_cache, start_cache_cleanup_task};
use crate::config::AppConfig;
use crate::forecast::{OpenMeteoClient, WeatherSource};
use crate::locations::{IpPositionClient, OpenMeteoGeocoder, PlaceSearch};
use crate::notifications::{NotificationService, NotificationServiceConfig, Notifier};
use crate::scheduler::{RainWatch, SchedulerService};
use crate::session::SessionController;
use crate::storage::{JsonStore, LocationStore, NotifiedLedger};

/// Shared HTTP client configuration
const HTTP_TIMEOUT_SECS: u64 = 30;
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 5;
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Upper bound for a request, covering one upstream forecast fetch
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub places: Arc<dyn PlaceSearch>,
    pub locations: Arc<LocationStore>,
    pub scheduler_service: Arc<SchedulerService>,
}

/// Create shared HTTP client with connection pooling
fn create_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .pool_max_idle_per_host(10)
        .build()
}

/// Handle request timeout errors
async fn handle_timeout_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {}", err),
        )
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

/// Wrap the routes with the shared middleware stack
fn build_app(state: AppState) -> Router {
    routes::build_router()
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "raincheck=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!(data_dir = %config.data_dir, "Configuration loaded successfully");

    let http_client = create_http_client()?;
    tracing::debug!("Shared HTTP client created");

    // Local records
    let store = JsonStore::new(&config.data_dir);
    let ledger = Arc::new(
        NotifiedLedger::open(
            store.clone(),
            Utc::now().date_naive(),
            config.notified_retention_days,
        )
        .await,
    );
    let locations = Arc::new(LocationStore::open(store).await);

    // Notification backends
    let ntfy = config.notifications.ntfy.as_ref();
    let gotify = config.notifications.gotify.as_ref();
    let notification_service = Arc::new(NotificationService::from_config(
        NotificationServiceConfig {
            client: http_client.clone(),
            ntfy_url: ntfy.map(|n| n.url.as_str()),
            ntfy_topic: ntfy.map(|n| n.topic.as_str()),
            ntfy_token: ntfy.and_then(|n| n.token.as_deref()),
            ntfy_username: ntfy.and_then(|n| n.username.as_deref()),
            ntfy_password: ntfy.and_then(|n| n.password.as_deref()),
            gotify_url: gotify.map(|g| g.url.as_str()),
            gotify_token: gotify.map(|g| g.token.as_str()),
        },
    ));

    if notification_service.is_configured() {
        tracing::info!("Notification service configured");
    } else {
        tracing::info!("No notification services configured");
    }

    let alerts = Arc::new(RainAlertService::new(
        notification_service,
        Arc::clone(&ledger),
    ));

    // Upstream sources
    let weather: Arc<dyn WeatherSource> = Arc::new(OpenMeteoClient::new(
        http_client.clone(),
        &config.open_meteo.forecast_url,
    ));
    let position = Arc::new(IpPositionClient::new(
        http_client.clone(),
        &config.position.url,
    ));

    let search_cache = create_search_cache();
    start_cache_cleanup_task(search_cache.clone());
    let places: Arc<dyn PlaceSearch> = Arc::new(OpenMeteoGeocoder::new(
        http_client,
        &config.open_meteo.geocoding_url,
        &config.open_meteo.language,
        config.open_meteo.search_limit,
        search_cache,
    ));

    let controller = Arc::new(
        SessionController::new(
            Arc::clone(&weather),
            position,
            Arc::clone(&locations),
            Arc::clone(&alerts),
            config.default_location.clone().into(),
            config.default_offset_hours,
        )
        .await,
    );

    // Periodic rain check
    let watch = Arc::new(RainWatch::new(
        weather,
        Arc::clone(&locations),
        alerts,
        Arc::clone(&controller),
    ));
    let scheduler_service = Arc::new(SchedulerService::new(watch).await?);

    if config.rain_check.enabled {
        scheduler_service
            .schedule_rain_check(&config.rain_check.cron, &config.rain_check.timezone)
            .await?;
        scheduler_service.start().await?;
        tracing::info!("Scheduler started with rain check");
    } else {
        tracing::info!("Rain check disabled");
    }

    // Initial selection: device position, else saved, else default
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            let view = controller.locate().await;
            if let Some(location) = view.location {
                tracing::info!(location = %location.name, "Initial location selected");
            }
        });
    }

    let state = AppState {
        controller,
        places,
        locations,
        scheduler_service,
    };

    let app = build_app(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::tests::{series_raining_on, FakeNotifier};
    use crate::forecast::{ForecastError, WeatherSeries};
    use crate::locations::{Location, PositionError, PositionSource, SearchError};
    use async_trait::async_trait;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    struct StaticWeather;

    #[async_trait]
    impl WeatherSource for StaticWeather {
        async fn fetch(&self, _location: &Location) -> Result<WeatherSeries, ForecastError> {
            Ok(series_raining_on(None))
        }
    }

    struct NoPosition;

    #[async_trait]
    impl PositionSource for NoPosition {
        async fn locate(&self) -> Result<Location, PositionError> {
            Err(PositionError::Unavailable("offline".to_string()))
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl PlaceSearch for BrokenSearch {
        async fn search(&self, _name: &str) -> Result<Vec<Location>, SearchError> {
            Err(SearchError::ApiError("502 Bad Gateway".to_string()))
        }
    }

    fn fixed_now() -> chrono::DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    async fn create_test_server(dir: &tempfile::TempDir) -> TestServer {
        let store = JsonStore::new(dir.path());
        let ledger = Arc::new(NotifiedLedger::open(store.clone(), fixed_now().date_naive(), 30).await);
        let locations = Arc::new(LocationStore::open(store).await);
        let alerts = Arc::new(RainAlertService::new(
            Arc::new(FakeNotifier::new(true, false)),
            ledger,
        ));
        let weather: Arc<dyn WeatherSource> = Arc::new(StaticWeather);

        let controller = Arc::new(
            SessionController::new(
                Arc::clone(&weather),
                Arc::new(NoPosition),
                Arc::clone(&locations),
                Arc::clone(&alerts),
                crate::config::DefaultLocation::default().into(),
                3,
            )
            .await
            .with_clock(fixed_now),
        );
        let watch = Arc::new(RainWatch::new(
            weather,
            Arc::clone(&locations),
            alerts,
            Arc::clone(&controller),
        ));

        let state = AppState {
            controller,
            places: Arc::new(BrokenSearch),
            locations,
            scheduler_service: Arc::new(SchedulerService::new(watch).await.unwrap()),
        };

        TestServer::new(build_app(state)).unwrap()
    }

    fn berlin() -> Value {
        json!({"id": "2950159", "name": "Berlin, Germany", "latitude": 52.52, "longitude": 13.41})
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_server(&dir).await;

        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "ok");
    }

    #[tokio::test]
    async fn test_search_failure_returns_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_server(&dir).await;

        let response = server.get("/search?name=berlin").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!([]));
    }

    #[tokio::test]
    async fn test_save_and_remove_location() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_server(&dir).await;

        server
            .post("/locations")
            .json(&berlin())
            .await
            .assert_status(StatusCode::CREATED);

        let list = server.get("/locations").await.json::<Value>();
        assert_eq!(list["count"], 1);
        assert_eq!(list["locations"][0]["id"], "2950159");

        server
            .delete("/locations/2950159")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete("/locations/2950159")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_live_position_saved_as_fixed_place() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_server(&dir).await;

        let response = server
            .post("/locations")
            .json(&json!({"id": "current-position", "name": "Here", "latitude": 48.1374,
                          "longitude": 11.5755, "is_live": true}))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Value>()["is_live"], false);

        let list = server.get("/locations").await.json::<Value>();
        assert_eq!(list["count"], 1);
        assert_eq!(list["locations"][0]["id"], "pos_48.1374_11.5755");
        assert_eq!(list["locations"][0]["is_live"], false);
    }

    #[tokio::test]
    async fn test_invalid_location_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_server(&dir).await;

        let response = server
            .post("/locations")
            .json(&json!({"id": "x", "name": "Nowhere", "latitude": 95.0, "longitude": 0.0}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_LOCATION");
    }

    #[tokio::test]
    async fn test_anchor_requires_selection() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_server(&dir).await;

        let response = server
            .put("/session/anchor")
            .json(&json!({"kind": "offset", "hours": 2}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_select_then_anchor_day() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_server(&dir).await;

        let view = server
            .post("/session/select")
            .json(&berlin())
            .await
            .json::<Value>();
        assert_eq!(view["data_location_id"], "2950159");
        assert_eq!(view["anchor"], json!({"kind": "offset", "hours": 3}));

        let view = server
            .put("/session/anchor")
            .json(&json!({"kind": "day", "date": "2024-06-02"}))
            .await
            .json::<Value>();
        assert_eq!(view["day"], "2024-06-02");
        assert_eq!(view["day_hourly"].as_array().unwrap().len(), 24);
    }

    #[tokio::test]
    async fn test_manual_rain_check() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_server(&dir).await;

        server.post("/locations").json(&berlin()).await;

        let summary = server.post("/alerts/check").await.json::<Value>();
        assert_eq!(summary["checked"], 1);
        assert_eq!(summary["notified"], json!([]));
    }
}
