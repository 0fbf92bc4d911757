use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use hrm_core::policy::AccessPolicy;
use hrm_storage::Database;

use crate::allocation::DaIncrementRunner;
use crate::auth::TokenValidator;
use crate::{employees, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    access_policy: AccessPolicy,
    token_validator: TokenValidator,
    increment_runner: DaIncrementRunner,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database, token_secret: &[u8]) -> Self {
        let clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync> = Arc::new(Utc::now);
        let increment_runner = DaIncrementRunner::new(storage.clone(), clock.clone());
        Self {
            metrics,
            storage,
            clock,
            access_policy: AccessPolicy::default(),
            token_validator: TokenValidator::new(token_secret),
            increment_runner,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock.clone();
        self.increment_runner = DaIncrementRunner::new(self.storage.clone(), clock);
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn access_policy(&self) -> &AccessPolicy {
        &self.access_policy
    }

    pub fn token_validator(&self) -> &TokenValidator {
        &self.token_validator
    }

    pub fn increment_runner(&self) -> &DaIncrementRunner {
        &self.increment_runner
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route(
            "/api/employees",
            get(employees::list).post(employees::create),
        )
        .route(
            "/api/employees/run-da-increment",
            post(employees::run_da_increment),
        )
        .route(
            "/api/employees/:id",
            get(employees::get).put(employees::update),
        )
        .route(
            "/api/employees/:id/attendance",
            post(employees::mark_attendance),
        )
        .route(
            "/api/employees/:id/task",
            post(employees::record_task_completion),
        )
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn setup_state() -> (TempDir, AppState) {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("hrm.db").display());
        let database = Database::connect(&url).await.expect("connect");
        database.run_migrations().await.expect("migrations");

        (dir, AppState::new(metrics, database, b"token-secret"))
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (_dir, state) = setup_state().await;
        let app = app_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let (_dir, state) = setup_state().await;
        let app = app_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let text = String::from_utf8(collected.to_vec()).expect("utf8");
        assert!(text.contains("app_build_info"));
        assert!(text.contains("app_uptime_seconds"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (_dir, state) = setup_state().await;
        let app = app_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
