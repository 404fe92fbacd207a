//! Sending hints.
//!
//! [`HintCoordinator`] turns a [`HintPlan`] into provider invocations. Hints
//! are advisory: a failed send is recorded in the [`HintOutcome`] and logged,
//! never returned as an error.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use providers::{InvocationMode, ProviderRegistry};

use crate::hint::planner::{plan_fan_out, plan_hints, HintPlan};
use crate::hint::{flag_payload, HintMessage, TriggeredFrom};
use crate::models::{OptimizationMode, WorkflowDefinition};

/// Default depth at which proxy hints stop propagating.
pub const DEFAULT_HINT_CEILING: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HintConfig {
    pub ceiling: u32,
    /// Multiplier applied to the backoff of recursive sends.
    pub backoff_factor: f64,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_HINT_CEILING,
            backoff_factor: 1.0,
        }
    }
}

/// Summary of one round of hint sends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HintOutcome {
    pub description: String,
    /// Steps whose provider accepted the hint.
    pub sent: Vec<String>,
    pub failed: Vec<String>,
    /// Connect time measured by the blocking hint, if one was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_time_ms: Option<u64>,
}

impl HintOutcome {
    fn skipped(description: String) -> Self {
        Self {
            description,
            ..Default::default()
        }
    }
}

/// Everything needed to stamp outgoing hint messages.
#[derive(Debug, Clone, PartialEq)]
pub struct HintOrigin {
    pub triggered_from: TriggeredFrom,
    pub workflow_name: String,
    pub optimization_mode: OptimizationMode,
}

#[derive(Clone)]
pub struct HintCoordinator {
    providers: Arc<ProviderRegistry>,
    config: HintConfig,
}

struct Delivery {
    step: String,
    result: Result<Option<Duration>, String>,
}

impl HintCoordinator {
    pub fn new(providers: Arc<ProviderRegistry>, config: HintConfig) -> Self {
        Self { providers, config }
    }

    pub fn config(&self) -> HintConfig {
        self.config
    }

    /// The hints a step invocation owes under its optimization mode.
    pub fn plan_for_step(
        &self,
        workflow: &WorkflowDefinition,
        origin: &HintOrigin,
        cold: bool,
    ) -> HintPlan {
        let mut rng = rand::thread_rng();
        plan_hints(
            origin.optimization_mode,
            workflow,
            &origin.triggered_from.step,
            cold,
            &mut rng,
        )
    }

    /// Send the hints a cold step invocation owes and wait for all of them.
    #[instrument(
        skip_all,
        fields(step = %origin.triggered_from.step, mode = %origin.optimization_mode)
    )]
    pub async fn send_hints(
        &self,
        workflow: &WorkflowDefinition,
        origin: &HintOrigin,
        cold: bool,
    ) -> HintOutcome {
        let plan = self.plan_for_step(workflow, origin, cold);
        self.execute(workflow, origin, plan).await
    }

    /// Propagate a proxy hint received by a cold instance.
    #[instrument(
        skip_all,
        fields(step = %message.step_name, counter = message.recursive_hint_counter)
    )]
    pub async fn fan_out(
        &self,
        workflow: &WorkflowDefinition,
        message: &HintMessage,
        receiver: TriggeredFrom,
    ) -> HintOutcome {
        // ThreadRng is !Send; keep it out of the future's state.
        let plan = {
            let mut rng = rand::thread_rng();
            plan_fan_out(message, workflow, self.config.ceiling, &mut rng)
        };
        let origin = HintOrigin {
            triggered_from: receiver,
            workflow_name: message.workflow_name.clone(),
            optimization_mode: message.optimization_mode,
        };
        self.execute(workflow, &origin, plan).await
    }

    /// Send the hints of an already computed plan.
    pub async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        origin: &HintOrigin,
        plan: HintPlan,
    ) -> HintOutcome {
        let (description, sends) = match plan {
            HintPlan::Skip(reason) => {
                debug!("{reason}");
                return HintOutcome::skipped(reason);
            }
            HintPlan::Flag(steps) => {
                let payload = flag_payload();
                let description = format!("flag hints sent to {} step(s)", steps.len());
                let sends: Vec<_> = steps
                    .into_iter()
                    .map(|step| {
                        let mode = InvocationMode::FireAndForget;
                        self.deliver(workflow, step, payload.clone(), mode, None)
                    })
                    .collect();
                (description, sends)
            }
            HintPlan::Messages { targets, counter } => {
                let description = format!(
                    "hint messages sent to {} step(s) at depth {counter}",
                    targets.len()
                );
                let sends: Vec<_> = targets
                    .into_iter()
                    .map(|target| {
                        let message = HintMessage {
                            triggered_from: origin.triggered_from.clone(),
                            optimization_mode: origin.optimization_mode,
                            step_name: target.step.clone(),
                            hint_proxy: target.proxy,
                            recursive_hint_counter: counter,
                            workflow_name: origin.workflow_name.clone(),
                            provider: target.designate,
                        };
                        let mode = if target.blocking {
                            InvocationMode::RequestResponse
                        } else {
                            InvocationMode::FireAndForget
                        };
                        let backoff_counter = (counter > 0).then_some(counter);
                        let payload = message.to_payload();
                        self.deliver(workflow, target.step, payload, mode, backoff_counter)
                    })
                    .collect();
                (description, sends)
            }
        };

        let mut outcome = HintOutcome::skipped(description);
        for delivery in join_all(sends).await {
            match delivery.result {
                Ok(connect_time) => {
                    if let Some(connect_time) = connect_time {
                        outcome.connect_time_ms = Some(connect_time.as_millis() as u64);
                    }
                    outcome.sent.push(delivery.step);
                }
                Err(message) => {
                    warn!(step = %delivery.step, "hint not delivered: {message}");
                    outcome.failed.push(delivery.step);
                }
            }
        }
        info!(
            sent = outcome.sent.len(),
            failed = outcome.failed.len(),
            "{}",
            outcome.description
        );
        outcome
    }

    /// Delay after a recursive send at depth `counter`.
    pub fn backoff(&self, counter: u32, connect_time: Duration) -> Duration {
        let remaining = self.config.ceiling.saturating_sub(counter);
        connect_time.mul_f64(self.config.backoff_factor * remaining as f64)
    }

    async fn deliver(
        &self,
        workflow: &WorkflowDefinition,
        step: String,
        payload: Value,
        mode: InvocationMode,
        backoff_counter: Option<u32>,
    ) -> Delivery {
        let Some(def) = workflow.step(&step) else {
            return Delivery {
                result: Err(format!("step {step} is not part of workflow {}", workflow.name)),
                step,
            };
        };
        let Some(invoker) = self.providers.get(&def.provider) else {
            return Delivery {
                result: Err(format!("no invoker for provider {}", def.provider)),
                step,
            };
        };

        let result = match invoker.invoke(&def.function_endpoint, &payload, mode).await {
            Ok(response) => {
                let connect_time = response.timings.connect_time();
                if let Some(counter) = backoff_counter {
                    let delay = self.backoff(counter, connect_time);
                    let delay_ms = delay.as_millis() as u64;
                    debug!(%step, counter, delay_ms, "recursive hint backoff");
                    tokio::time::sleep(delay).await;
                }
                Ok(mode.is_blocking().then_some(connect_time))
            }
            Err(e) => Err(e.to_string()),
        };

        Delivery { step, result }
    }
}

impl std::fmt::Debug for HintCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HintCoordinator")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hint::planner::HintTarget;
    use providers::mock::RecordingInvoker;
    use providers::{ConnectTimings, FunctionInvoker, Provider};
    use serde_json::json;

    /// a(start, aws) -> b(openWhisk) -> c(aws, end)
    fn workflow() -> WorkflowDefinition {
        serde_json::from_value(json!({
            "name": "wf",
            "startAt": "a",
            "workflow": {
                "a": { "type": "Task", "provider": "aws", "functionEndpoint": { "hostname": "a.example", "path": "/" }, "next": "b" },
                "b": { "type": "Task", "provider": "openWhisk", "functionEndpoint": { "hostname": "b.example", "path": "/" }, "next": "c" },
                "c": { "type": "Task", "provider": "aws", "functionEndpoint": { "hostname": "c.example", "path": "/" }, "end": true }
            }
        }))
        .unwrap()
    }

    fn coordinator(invoker: &RecordingInvoker) -> HintCoordinator {
        let shared: Arc<dyn FunctionInvoker> = Arc::new(invoker.clone());
        let registry = ProviderRegistry::from([
            (Provider::Aws, Arc::clone(&shared)),
            (Provider::OpenWhisk, shared),
        ]);
        HintCoordinator::new(Arc::new(registry), HintConfig::default())
    }

    fn origin(step: &str, mode: OptimizationMode) -> HintOrigin {
        HintOrigin {
            triggered_from: TriggeredFrom {
                function_execution_id: "fn-1".into(),
                function_instance_uuid: "inst-1".into(),
                step: step.into(),
                execution_uuid: "exec-1".into(),
            },
            workflow_name: "wf".into(),
            optimization_mode: mode,
        }
    }

    #[tokio::test]
    async fn naive_start_sends_flag_hints() {
        let invoker = RecordingInvoker::new();
        let outcome = coordinator(&invoker)
            .send_hints(&workflow(), &origin("a", OptimizationMode::Naive), true)
            .await;

        assert_eq!(outcome.sent, vec!["b", "c"]);
        for call in invoker.recorded() {
            assert_eq!(call.payload, json!({ "hintFlag": true }));
            assert_eq!(call.mode, InvocationMode::FireAndForget);
        }
    }

    #[tokio::test]
    async fn heuristic_messages_carry_origin_and_proxy_flag() {
        let invoker = RecordingInvoker::new();
        let outcome = coordinator(&invoker)
            .send_hints(&workflow(), &origin("a", OptimizationMode::Heuristic), true)
            .await;
        assert_eq!(outcome.sent, vec!["c", "b"]);

        let to_c = &invoker.calls_to("c.example")[0].payload["hintMessage"];
        assert_eq!(to_c["hintProxy"], false);
        assert_eq!(to_c["stepName"], "c");
        assert_eq!(to_c["recursiveHintCounter"], 0);
        assert_eq!(to_c["workflowName"], "wf");
        assert_eq!(to_c["triggeredFrom"]["wfState"], "exec-1");

        let to_b = &invoker.calls_to("b.example")[0].payload["hintMessage"];
        assert_eq!(to_b["hintProxy"], true);
    }

    #[tokio::test]
    async fn failed_sends_are_reported_not_raised() {
        let invoker = RecordingInvoker::new().failing_for("b.example");
        let outcome = coordinator(&invoker)
            .send_hints(&workflow(), &origin("a", OptimizationMode::NaiveAlways), true)
            .await;
        assert_eq!(outcome.sent, vec!["c"]);
        assert_eq!(outcome.failed, vec!["b"]);
    }

    #[tokio::test]
    async fn missing_invoker_is_a_failed_send() {
        let invoker = RecordingInvoker::new();
        let registry = ProviderRegistry::from([(
            Provider::Aws,
            Arc::new(invoker.clone()) as Arc<dyn FunctionInvoker>,
        )]);
        let coordinator = HintCoordinator::new(Arc::new(registry), HintConfig::default());

        let outcome = coordinator
            .send_hints(&workflow(), &origin("a", OptimizationMode::NaiveAlways), true)
            .await;
        assert_eq!(outcome.sent, vec!["c"]);
        assert_eq!(outcome.failed, vec!["b"]);
        assert_eq!(invoker.call_count(), 1);
    }

    #[tokio::test]
    async fn blocking_hint_reports_connect_time() {
        let invoker = RecordingInvoker::new().with_timings(ConnectTimings {
            dns: Duration::from_millis(3),
            tcp: Duration::from_millis(12),
            tls: Duration::ZERO,
        });
        let outcome = coordinator(&invoker)
            .send_hints(
                &workflow(),
                &origin("a", OptimizationMode::HeuristicProviderSeparation),
                true,
            )
            .await;

        assert_eq!(outcome.connect_time_ms, Some(12));
        let calls = invoker.recorded();
        assert_eq!(calls.len(), 2);
        let blocking: Vec<_> = calls.iter().filter(|c| c.mode.is_blocking()).collect();
        assert_eq!(blocking.len(), 1);
        assert_eq!(blocking[0].endpoint.hostname, "c.example");
    }

    #[test]
    fn backoff_shrinks_with_depth() {
        let invoker = RecordingInvoker::new();
        let coordinator = coordinator(&invoker);
        let connect = Duration::from_millis(10);
        assert_eq!(coordinator.backoff(1, connect), Duration::from_millis(20));
        assert_eq!(coordinator.backoff(2, connect), Duration::from_millis(10));
        assert_eq!(coordinator.backoff(3, connect), Duration::ZERO);
        assert_eq!(coordinator.backoff(5, connect), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn recursive_sends_wait_out_their_backoff() {
        let invoker = RecordingInvoker::new().with_timings(ConnectTimings {
            dns: Duration::ZERO,
            tcp: Duration::from_millis(100),
            tls: Duration::ZERO,
        });
        let coordinator = coordinator(&invoker);
        let plan = HintPlan::Messages {
            targets: vec![HintTarget {
                step: "c".into(),
                proxy: true,
                blocking: false,
                designate: None,
            }],
            counter: 1,
        };

        let started = tokio::time::Instant::now();
        let outcome = coordinator
            .execute(&workflow(), &origin("a", OptimizationMode::Heuristic), plan)
            .await;
        assert_eq!(outcome.sent, vec!["c"]);
        assert!(started.elapsed() >= Duration::from_millis(200));

        let sent = &invoker.recorded()[0].payload["hintMessage"];
        assert_eq!(sent["recursiveHintCounter"], 1);
    }

    #[tokio::test]
    async fn fan_out_is_stamped_by_the_receiver() {
        let invoker = RecordingInvoker::new();
        let coordinator = coordinator(&invoker);
        let message = HintMessage {
            triggered_from: origin("b", OptimizationMode::Heuristic).triggered_from,
            optimization_mode: OptimizationMode::Heuristic,
            step_name: "a".into(),
            hint_proxy: true,
            recursive_hint_counter: 2,
            workflow_name: "wf".into(),
            provider: None,
        };
        let receiver = TriggeredFrom {
            function_execution_id: "fn-2".into(),
            function_instance_uuid: "inst-2".into(),
            step: "a".into(),
            execution_uuid: "exec-1".into(),
        };

        let outcome = coordinator.fan_out(&workflow(), &message, receiver).await;
        assert_eq!(outcome.sent, vec!["c"]);
        let sent = &invoker.recorded()[0].payload["hintMessage"];
        assert_eq!(sent["recursiveHintCounter"], 3);
        assert_eq!(sent["hintProxy"], true);
        assert_eq!(sent["triggeredFrom"]["functionInstanceUuid"], "inst-2");
    }
}
