use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chess_core::pgn::PgnError;
use serde_json::json;

use crate::clients::openai::LlmError;
use crate::services::analyst::AnalysisError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Upstream(#[from] LlmError),
}

impl From<PgnError> for AppError {
    fn from(e: PgnError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Pgn(e) => e.into(),
            AnalysisError::Model(e) => AppError::Upstream(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Upstream(e) => {
                tracing::error!("Language model error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        // Match FastAPI error format: {"detail": "message"}
        (status, Json(json!({ "detail": message }))).into_response()
    }
}
