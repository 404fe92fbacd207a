use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use engine::{HopMetadata, InboundRequest, InvocationResponse};

use super::AppState;
use crate::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const STEP_METADATA_HEADER: &str = "x-step-metadata";
pub const REMAINING_TIME_HEADER: &str = "x-remaining-time-ms";

pub async fn invoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<InvocationResponse>, ApiError> {
    let request = InboundRequest::from_json(body)?;
    let hop = hop_metadata(&headers);
    let response = state
        .runtime
        .handle(request, state.handler.as_ref(), hop)
        .await?;
    Ok(Json(response))
}

/// Hop metadata from request headers; a missing request id is generated.
pub fn hop_metadata(headers: &HeaderMap) -> HopMetadata {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    HopMetadata {
        function_execution_id: header(REQUEST_ID_HEADER)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        step_metadata: header(STEP_METADATA_HEADER)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(Value::Null),
        remaining_time: header(REMAINING_TIME_HEADER)
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_millis),
    }
}
