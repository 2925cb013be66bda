//! # roster: student and group registry
//!
//! An HTTP service for students and the groups they are enrolled in. Groups form a forest:
//! every group has at most one parent, and the service guarantees the hierarchy stays acyclic
//! and that only leaf groups are deleted.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌────────────┐
//! │ api handlers │ ──> │ db::handlers     │ ──> │ PostgreSQL │
//! │ (axum)       │     │ (repositories)   │     └────────────┘
//! └──────┬───────┘     └────────┬─────────┘
//!        │                      │ validates writes with
//!        │                      ↓
//!        │             ┌──────────────────┐
//!        │             │ hierarchy        │
//!        │             └──────────────────┘
//!        │ renders GET /groups with
//!        ↓
//! ┌──────────────┐
//! │ tree         │
//! └──────────────┘
//! ```
//!
//! - [`api`]: routes, typed request/response models and extractors
//! - [`db`]: repositories over a borrowed connection or transaction
//! - [`hierarchy`]: pure validation of parent assignments and deletions
//! - [`tree`]: nested or flat rendering of the group list
//! - [`errors`]: one error type mapped to HTTP statuses and `{"detail": ...}` bodies
//!
//! ## Running
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/roster cargo run -- -f config.yaml
//! ```
//!
//! Migrations in `migrations/` are applied at startup. See [`config`] for every setting.
//!
//! ## Testing
//!
//! Repository and HTTP tests use `#[sqlx::test]`, which creates a throwaway database per test
//! from `DATABASE_URL` and applies the migrations. Enable the `test-utils` feature to use
//! [`test_utils`] from outside the crate.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod hierarchy;
mod openapi;
pub mod telemetry;
pub mod tree;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::api::handlers::{groups, students};
use crate::openapi::ApiDoc;
use axum::{Router, routing::get};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

/// Shared state handed to every handler
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the roster database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to the configured database and bring its schema up to date
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout())
        .idle_timeout(settings.idle_timeout())
        .max_lifetime(settings.max_lifetime())
        .connect(&config.database.url)
        .await?;

    Ok(pool)
}

/// Build the HTTP router: API routes, documentation, health check and optional metrics
pub fn build_router(state: AppState) -> Router {
    let enable_metrics = state.config.enable_metrics;

    let api_routes = Router::new()
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/groups/{group_id}",
            get(groups::get_group).put(groups::update_group).delete(groups::delete_group),
        )
        .route("/students", get(students::list_students).post(students::create_student))
        .route(
            "/students/{student_id}",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .with_state(state);

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Add Prometheus metrics if enabled
    if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Main application struct that owns the router, the pool and the configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database and runs migrations
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown future resolves, in-flight requests finish, the pool is
///    closed and pending spans are flushed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application around an existing pool, or a new one built from `config` when
    /// `pool` is `None`
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting roster with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => setup_database(&config).await?,
        };
        migrator().run(&pool).await?;

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(app_state);

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("roster listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_health_and_docs(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");

        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/groups/{group_id}"].is_object());

        server.get("/docs").await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_metrics_disabled_by_default(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server.get("/internal/metrics").await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }
}
