use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

/// RFC 7807 error body returned by every failing employee route.
#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        counter!("api_requests_rejected_total", "reason" => "unauthorized").increment(1);
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", detail)
    }

    pub fn forbidden() -> Self {
        counter!("api_requests_rejected_total", "reason" => "forbidden").increment(1);
        Self::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "caller role is not permitted to perform this operation",
        )
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "employee not found")
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        counter!("api_requests_rejected_total", "reason" => "validation").increment(1);
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", detail)
    }

    /// Generic server failure. The underlying cause is logged by the caller, never echoed.
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "server error",
        )
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
