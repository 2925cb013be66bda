//! Test utilities for integration testing (available with `test-utils` feature).

use crate::config::{Config, DatabaseConfig, PoolSettings};
use axum_test::TestServer;
use sqlx::PgPool;

/// Build the full application on top of a test pool
pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            // The pool is supplied by the test harness
            url: "postgres://unused".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
        },
        ..Default::default()
    }
}
