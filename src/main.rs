use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use microsaas::entitlements::{PgUsageStore, UsageStore};
use microsaas::principals::{PgPrincipalStore, PrincipalStore};
use microsaas::routes::app;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    // Fail fast if the JWT secret is missing
    let _ = microsaas::JWT_SECRET.as_str();
    let pool = PgPoolOptions::new()
        .max_connections(*microsaas::DATABASE_MAX_CONNECTIONS)
        .connect(microsaas::DATABASE_URL.as_str())
        .await?;

    if let Err(error) = sqlx::migrate!().run(&pool).await {
        if *microsaas::ALLOW_MIGRATION_FAILURE {
            tracing::warn!(
                ?error,
                "Database migrations failed but continuing due to ALLOW_MIGRATION_FAILURE"
            );
        } else {
            return Err(Box::new(error) as Box<dyn std::error::Error>);
        }
    }

    let principals: Arc<dyn PrincipalStore> = Arc::new(PgPrincipalStore::new(pool.clone()));
    let usage: Arc<dyn UsageStore> = Arc::new(PgUsageStore::new(pool));
    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let router = app(principals, usage)
        .route(
            "/metrics",
            get(move || async move { metrics_handle.render() }),
        )
        .layer(prometheus_layer);

    let addr: SocketAddr = format!(
        "{}:{}",
        microsaas::BIND_ADDRESS.as_str(),
        *microsaas::BIND_PORT
    )
    .parse()
    .map_err(|error| Box::new(error) as Box<dyn std::error::Error>)?;
    tracing::info!(%addr, "Listening for incoming connections");
    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}
