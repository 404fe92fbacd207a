//! Mapping engine errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use engine::EngineError;
use handlers::HandlerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        let Self::Engine(e) = self;
        match e {
            EngineError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            EngineError::Handler(HandlerError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            EngineError::UnknownWorkflow(_) => StatusCode::NOT_FOUND,
            EngineError::StepResolution { .. }
            | EngineError::UnknownProvider { .. }
            | EngineError::InvalidDefinition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Network(_) | EngineError::QueuePublish(_) => StatusCode::BAD_GATEWAY,
            EngineError::Handler(_)
            | EngineError::DefinitionLoad(_)
            | EngineError::Report(_)
            | EngineError::TaskAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, "invocation failed: {self}");
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
