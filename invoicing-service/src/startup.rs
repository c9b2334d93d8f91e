//! Application startup and lifecycle management.

use crate::config::InvoicingConfig;
use crate::error::InvoicingError;
use crate::models::UserProfile;
use crate::services::{
    get_metrics, init_metrics, ContractorRepository, ContractorService, Database, HealthCheck,
    Identity, IdentityProvider, InvoiceRepository, InvoiceService, JwtIdentityProvider,
    ProfileRepository, ProfileService,
};
use axum::{
    extract::State, http::StatusCode, middleware, response::IntoResponse, routing::get, Json,
    Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub invoices: Arc<InvoiceService>,
    pub profiles: Arc<ProfileService>,
    pub contractors: Arc<ContractorService>,
    identity: Arc<dyn IdentityProvider>,
    health: Arc<dyn HealthCheck>,
}

impl AppState {
    /// Wire every service over one backing store.
    pub fn new<D>(store: Arc<D>, identity: Arc<dyn IdentityProvider>) -> Self
    where
        D: InvoiceRepository + ProfileRepository + ContractorRepository + HealthCheck + 'static,
    {
        let invoices: Arc<dyn InvoiceRepository> = store.clone();
        let profiles: Arc<dyn ProfileRepository> = store.clone();
        let contractors: Arc<dyn ContractorRepository> = store.clone();

        Self {
            invoices: Arc::new(InvoiceService::new(
                invoices,
                profiles.clone(),
                contractors.clone(),
            )),
            profiles: Arc::new(ProfileService::new(profiles)),
            contractors: Arc::new(ContractorService::new(contractors)),
            identity,
            health: store,
        }
    }

    /// Resolve a caller credential to its identity and profile, creating
    /// the profile on first sign-in. Business operations take the
    /// resulting `user_id`.
    #[tracing::instrument(skip(self, credential))]
    pub async fn sign_in(
        &self,
        credential: &str,
    ) -> Result<(Identity, UserProfile), InvoicingError> {
        let identity = self.identity.verify(credential).await?;
        let profile = self
            .profiles
            .ensure(identity.user_id, identity.email.clone())
            .await?;
        tracing::debug!(user_id = %identity.user_id, "Caller signed in");
        Ok((identity, profile))
    }
}

/// Liveness probe.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.health.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "invoicing-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "invoicing-service"
                })),
            )
        }
    }
}

/// Readiness probe.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.health.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Operational HTTP routes: health, readiness and Prometheus metrics.
pub fn ops_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let identity = Arc::new(JwtIdentityProvider::new(
            &config.auth.jwt_secret,
            &config.auth.jwt_audience,
        ));
        let state = AppState::new(Arc::new(db), identity);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Invoicing service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = ops_router(self.state);

        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
