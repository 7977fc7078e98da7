use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
///
/// `Configuration`, `Validation`, `EmptyPool`, `NotFound` and `Conflict` are
/// the expected outcomes for a caller. Model failures never become an
/// `AppError`; they are absorbed by the planner/justifier fallbacks.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Catalog unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("No candidates left after relaxing every filter")]
    EmptyPool,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

const UPSTREAM_MESSAGE: &str =
    "The tourism catalog is unreachable right now. Please try again in a moment.";
const EMPTY_POOL_MESSAGE: &str =
    "No destinations matched these choices. Try different scenery, transport or trip length.";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Configuration(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::EmptyPool => (
                StatusCode::UNPROCESSABLE_ENTITY,
                EMPTY_POOL_MESSAGE.to_string(),
            ),
            AppError::UpstreamUnavailable(ref detail) => {
                tracing::error!(detail = %detail, "Catalog unavailable");
                (StatusCode::BAD_GATEWAY, UPSTREAM_MESSAGE.to_string())
            }
            AppError::HttpClient(ref e) => {
                tracing::error!(error = %e, "Catalog request failed");
                (StatusCode::BAD_GATEWAY, UPSTREAM_MESSAGE.to_string())
            }
            AppError::Internal(ref detail) => {
                tracing::error!(detail = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong while building recommendations.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Malformed or mistyped request bodies are reported like any other bad input
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
