// Climate Pipeline v0.1
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod helpers;
mod routes;
mod services;
mod store;

use config::AppConfig;
use services::catalog::TargetCatalog;
use services::collector::{BatchCollector, SystemClock};
use services::open_meteo::OpenMeteoClient;
use services::poller::{Poller, PollerState, SharedPollerState};
use services::risk::RiskThresholds;
use store::sink::CsvSink;

/// Climate Pipeline status API: OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Climate Pipeline",
        version = "0.1.0",
        description = "Polls Open-Meteo weather and air-quality data for a set of monitored \
            locations, derives wet-bulb temperature and a composite risk tier, and appends \
            every cycle to a CSV time series. This API reports the poller's progress and \
            the latest batch of readings.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Poller", description = "Background poller status"),
        (name = "Readings", description = "Latest derived readings"),
    ),
    paths(
        routes::health::health_check,
        routes::poller::get_poller_status,
        routes::readings::get_latest_readings,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            services::poller::PollerState,
            services::collector::SkippedTarget,
            services::risk::RiskTier,
            store::models::Record,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let client = match OpenMeteoClient::from_config(&config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let catalog = TargetCatalog::from_config(config.targets_file.as_deref());
    match &catalog {
        TargetCatalog::File(path) => tracing::info!("Target catalog: {}", path.display()),
        TargetCatalog::Static(targets) => {
            tracing::info!("Target catalog: {} built-in monitors", targets.len())
        }
    }

    let poller_state: SharedPollerState = Arc::new(RwLock::new(PollerState::new()));
    let poller = Poller::new(
        catalog,
        BatchCollector::new(client, SystemClock, RiskThresholds::default()),
        CsvSink::new(&config.data_store),
        config.poll_interval,
        poller_state.clone(),
    );

    // The poller stops at its next sleep once `cancel` fires; the status
    // server outlives it so the final state stays observable until exit.
    let cancel = CancellationToken::new();
    let server_shutdown = CancellationToken::new();

    tokio::spawn(cancel_on_signal(cancel.clone()));
    let poller_handle = tokio::spawn(poller.run(cancel));
    let server_handle = tokio::spawn(serve_status_api(
        config.port,
        poller_state,
        server_shutdown.clone(),
    ));

    if let Err(e) = poller_handle.await {
        tracing::error!("Poller task terminated abnormally: {}", e);
    }
    server_shutdown.cancel();
    if let Err(e) = server_handle.await {
        tracing::error!("Status server task terminated abnormally: {}", e);
    }

    tracing::info!("Pipeline deactivated");
}

/// Initialize tracing. `RUST_LOG` overrides the default filter; `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "climate_pipeline=info,tower_http=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

fn build_router(poller_state: SharedPollerState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route(
            "/api/v1/poller/status",
            get(routes::poller::get_poller_status),
        )
        .route(
            "/api/v1/readings/latest",
            get(routes::readings::get_latest_readings),
        )
        .with_state(poller_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Serve the status API until `shutdown` fires. A bind failure is logged and
/// leaves the poller running without the API.
async fn serve_status_api(port: u16, poller_state: SharedPollerState, shutdown: CancellationToken) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind status API on {}: {}", addr, e);
            return;
        }
    };

    tracing::info!("Status API listening on {}", addr);
    tracing::info!("Swagger UI available at http://localhost:{}/swagger-ui/", port);

    if let Err(e) = axum::serve(listener, build_router(poller_state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        tracing::error!("Status API terminated unexpectedly: {}", e);
    }
}

/// Cancel `token` on the first SIGINT (Ctrl-C) or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown requested, finishing the current cycle");
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_serves_status_endpoints() {
        let state: SharedPollerState = Arc::new(RwLock::new(PollerState::new()));

        let health = build_router(state.clone())
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let status = build_router(state.clone())
            .oneshot(Request::get("/api/v1/poller/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(status.status(), StatusCode::OK);

        let readings = build_router(state)
            .oneshot(Request::get("/api/v1/readings/latest").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(readings.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_openapi_lists_all_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/health",
            "/api/v1/poller/status",
            "/api/v1/readings/latest",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
