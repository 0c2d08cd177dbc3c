use axum::{
    routing::{get, post},
    Json, Router,
};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use givehaven_backend::api;
use givehaven_backend::config::AppConfig;
use givehaven_backend::database::donation_repository::DonationRepository;
use givehaven_backend::database::issue_repository::IssueRepository;
use givehaven_backend::database::repository::{DonationStore, IssueStore};
use givehaven_backend::database::init_pool_from_config;
use givehaven_backend::health::{HealthChecker, HealthStatus};
use givehaven_backend::logging::init_tracing;
use givehaven_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use givehaven_backend::payments::provider::PaymentGateway;
use givehaven_backend::payments::providers::PaystackGateway;
use givehaven_backend::services::donation::DonationService;
use givehaven_backend::services::verification::VerificationOrchestrator;
use givehaven_backend::services::webhook_processor::WebhookProcessor;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    dotenv().ok();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "Starting GiveHaven donations backend"
    );

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!("Initializing database connection pool...");
    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e)
    })?;
    info!("Database connection pool initialized");

    info!("Initializing payment gateway client...");
    let gateway: Arc<dyn PaymentGateway> = Arc::new(PaystackGateway::from_env().map_err(|e| {
        error!("Failed to initialize payment gateway: {}", e);
        anyhow::anyhow!(e.to_string())
    })?);
    info!(gateway = gateway.name(), "Payment gateway client initialized");

    // Stores and services, constructed once and injected; no module-level
    // client handles anywhere downstream.
    let donations: Arc<dyn DonationStore> = Arc::new(DonationRepository::new(db_pool.clone()));
    let issues: Arc<dyn IssueStore> = Arc::new(IssueRepository::new(db_pool.clone()));

    let orchestrator = Arc::new(VerificationOrchestrator::new(
        gateway.clone(),
        donations.clone(),
        issues.clone(),
    ));
    let donation_service = Arc::new(DonationService::new(
        gateway.clone(),
        donations.clone(),
        issues.clone(),
    ));
    let webhook_processor = Arc::new(WebhookProcessor::new(
        gateway.clone(),
        donations.clone(),
        orchestrator.clone(),
    ));

    let health_checker = HealthChecker::new(db_pool.clone());

    info!("Setting up application routes...");

    let donation_state = api::donations::DonationApiState {
        service: donation_service,
        orchestrator,
        donations,
    };
    let donation_routes = Router::new()
        .route("/api/donations", post(api::donations::initiate_donation))
        .route(
            "/api/donations/verify",
            get(api::donations::verify_donation),
        )
        .route("/api/donations/{id}", get(api::donations::get_donation))
        .with_state(donation_state);

    let webhook_state = api::webhooks::WebhookState {
        processor: webhook_processor,
    };
    let webhook_routes = Router::new()
        .route(
            "/webhooks/paystack",
            post(api::webhooks::handle_paystack_webhook),
        )
        .with_state(webhook_state);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(health_checker)
        .merge(donation_routes)
        .merge(webhook_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    info!("Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(
        address = %addr,
        "GiveHaven donations backend listening on http://{}",
        addr
    );
    info!("Server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

// Handlers

async fn root() -> &'static str {
    "Welcome to the GiveHaven Donations API"
}

async fn health(
    axum::extract::State(checker): axum::extract::State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = checker.check_health().await;

    if !health_status.is_healthy() {
        error!("Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: axum::extract::State<HealthChecker>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - checks if the service is alive (basic check)
async fn liveness() -> Result<&'static str, (axum::http::StatusCode, String)> {
    Ok("OK")
}
