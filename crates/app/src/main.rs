mod allocation;
mod auth;
mod employees;
mod problem;
mod router;
mod telemetry;

use std::net::SocketAddr;

use hrm_storage::Database;
use hrm_util::{load_env_file, AppConfig};
use tracing::info;

use crate::allocation::IncrementWorker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "app", database = %config.database_url, "database ready");

    let state = router::AppState::new(metrics, database, &config.auth_token_secret);

    if let Some(interval) = config.da_increment_interval {
        IncrementWorker::new(state.increment_runner().clone(), interval).spawn();
    }

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
