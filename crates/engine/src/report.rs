//! Per-step reports for an external monitor.
//!
//! A report is emitted when the execution asks for it (`sendReports`) or runs
//! in report-only mode. Delivery is best effort.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::models::OptimizationMode;
use crate::state::ExecutionState;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("monitor {url} unreachable: {message}")]
    Unreachable { url: String, message: String },

    #[error("monitor {url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("monitor client setup failed: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeMetrics {
    /// Corrected start of this invocation, milliseconds since the Unix epoch.
    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_since_previous_end_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub workflow_name: String,
    pub step_name: String,
    pub workflow_execution_uuid: String,
    pub step_execution_uuid: String,
    pub instance_uuid: String,
    pub cold_execution: bool,
    pub optimization_mode: OptimizationMode,
    pub time_metrics: TimeMetrics,
}

impl StepReport {
    /// Build the report for the hop currently held by `state`.
    pub fn for_hop(
        state: &ExecutionState,
        function_execution_id: &str,
        started: DateTime<Utc>,
        previous_end: Option<DateTime<Utc>>,
        remaining_time: Option<Duration>,
    ) -> Self {
        Self {
            workflow_name: state.workflow_name.clone(),
            step_name: state.current_step.clone(),
            workflow_execution_uuid: state.execution_uuid.clone(),
            step_execution_uuid: function_execution_id.to_owned(),
            instance_uuid: state.function_instance_uuid.clone(),
            cold_execution: state.cold_execution,
            optimization_mode: state.optimization_mode,
            time_metrics: TimeMetrics {
                start_time: started.timestamp_millis(),
                elapsed_since_previous_end_ms: previous_end
                    .map(|end| (started - end).num_milliseconds()),
                remaining_time_ms: remaining_time.map(|d| d.as_millis() as u64),
            },
        }
    }
}

/// Whether the execution wants a report for this hop.
pub fn should_report(state: &ExecutionState) -> bool {
    state.send_reports || state.optimization_mode == OptimizationMode::ReportOnly
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn report(&self, report: &StepReport) -> Result<(), ReportError>;
}

/// Posts reports as JSON to a monitor URL.
#[derive(Debug, Clone)]
pub struct HttpMonitor {
    http: Client,
    url: String,
}

impl HttpMonitor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ReportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::Client(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReportSink for HttpMonitor {
    async fn report(&self, report: &StepReport) -> Result<(), ReportError> {
        let response = self
            .http
            .post(&self.url)
            .json(report)
            .send()
            .await
            .map_err(|e| ReportError::Unreachable {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        debug!(url = %self.url, step = %report.step_name, "report delivered");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::catalog::WorkflowCatalog;
    use crate::state::{HopContext, StateSnapshot};
    use serde_json::json;

    /// Collects reports in memory.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct CollectingSink {
        pub reports: Arc<Mutex<Vec<StepReport>>>,
    }

    #[async_trait]
    impl ReportSink for CollectingSink {
        async fn report(&self, report: &StepReport) -> Result<(), ReportError> {
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    fn state(mode: u8, send_reports: bool) -> ExecutionState {
        let catalog = WorkflowCatalog::from_json_str(
            &json!({ "workflows": [{
                "name": "wf", "startAt": "a",
                "workflow": { "a": { "type": "Task", "provider": "aws",
                    "functionEndpoint": { "hostname": "a", "path": "/" }, "end": true } }
            }]})
            .to_string(),
        )
        .unwrap();
        let snapshot: StateSnapshot = serde_json::from_value(json!({
            "workflowName": "wf",
            "optimizationMode": mode,
            "sendReports": send_reports
        }))
        .unwrap();
        let hop = HopContext {
            function_execution_id: "fn-1".into(),
            cold_execution: true,
            function_instance_uuid: "inst-1".into(),
            ..Default::default()
        };
        ExecutionState::initialize(Some(snapshot), &catalog, &hop).unwrap()
    }

    #[test]
    fn reports_are_requested_by_flag_or_report_only_mode() {
        assert!(!should_report(&state(3, false)));
        assert!(should_report(&state(3, true)));
        assert!(should_report(&state(5, false)));
    }

    #[test]
    fn report_carries_hop_identity_and_timing() {
        let state = state(5, false);
        let started = DateTime::from_timestamp(1_000, 0).unwrap();
        let previous = DateTime::from_timestamp(998, 500_000_000).unwrap();

        let report = StepReport::for_hop(
            &state,
            "fn-1",
            started,
            Some(previous),
            Some(Duration::from_millis(2_500)),
        );
        let wire = serde_json::to_value(&report).unwrap();

        assert_eq!(wire["workflowName"], "wf");
        assert_eq!(wire["stepName"], "a");
        assert_eq!(wire["stepExecutionUuid"], "fn-1");
        assert_eq!(wire["instanceUuid"], "inst-1");
        assert_eq!(wire["coldExecution"], true);
        assert_eq!(wire["optimizationMode"], 5);
        assert_eq!(wire["timeMetrics"]["startTime"], 1_000_000);
        assert_eq!(wire["timeMetrics"]["elapsedSincePreviousEndMs"], 1_500);
        assert_eq!(wire["timeMetrics"]["remainingTimeMs"], 2_500);
    }

    #[test]
    fn first_hop_omits_elapsed_time() {
        let report = StepReport::for_hop(&state(5, false), "fn-1", Utc::now(), None, None);
        let wire = serde_json::to_value(&report).unwrap();
        assert!(wire["timeMetrics"].get("elapsedSincePreviousEndMs").is_none());
        assert!(wire["timeMetrics"].get("remainingTimeMs").is_none());
    }
}
