use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// `None` until the instance served its first invocation.
    pub function_instance_uuid: Option<String>,
}

/// Does not count as an invocation, so it never warms the instance.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        function_instance_uuid: state.runtime.tracker().identity(),
    })
}
