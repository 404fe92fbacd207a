//! Deciding whom to hint.
//!
//! Planning is pure: it looks only at the workflow graph, the mode and the
//! message being handled. Sending is left to the coordinator.

use rand::seq::SliceRandom;
use rand::Rng;

use providers::Provider;

use crate::hint::HintMessage;
use crate::models::{OptimizationMode, WorkflowDefinition};

/// One step to hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintTarget {
    pub step: String,
    /// Ask the receiver to keep propagating.
    pub proxy: bool,
    /// Wait for the receiver to answer instead of only for the provider's ack.
    pub blocking: bool,
    /// Provider the receiver should forward one further proxy hint to.
    pub designate: Option<Provider>,
}

impl HintTarget {
    fn direct(step: &str) -> Self {
        Self {
            step: step.to_owned(),
            proxy: false,
            blocking: false,
            designate: None,
        }
    }

    fn proxy(step: &str) -> Self {
        Self {
            step: step.to_owned(),
            proxy: true,
            blocking: false,
            designate: None,
        }
    }

    /// Proxy hint whose receiver forwards to the provider following `provider`.
    fn proxy_on(
        workflow: &WorkflowDefinition,
        step: &str,
        provider: &Provider,
        sender: &Provider,
    ) -> Self {
        Self {
            designate: workflow.provider_after(provider, sender).cloned(),
            ..Self::proxy(step)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintPlan {
    /// Nothing to send, with the reason.
    Skip(String),
    /// Flag-only hints to these steps.
    Flag(Vec<String>),
    /// Hint messages carrying `counter` as their recursion depth.
    Messages { targets: Vec<HintTarget>, counter: u32 },
}

impl HintPlan {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip(_))
    }

    /// Split off the targets the sender waits on.
    ///
    /// Returns the blocking part, if any, and the fire-and-forget remainder.
    pub fn split_blocking(self) -> (Option<HintPlan>, HintPlan) {
        match self {
            Self::Messages { targets, counter } if targets.iter().any(|t| t.blocking) => {
                let (blocking, rest): (Vec<_>, Vec<_>) =
                    targets.into_iter().partition(|t| t.blocking);
                (
                    Some(Self::Messages {
                        targets: blocking,
                        counter,
                    }),
                    Self::Messages {
                        targets: rest,
                        counter,
                    },
                )
            }
            plan => (None, plan),
        }
    }

    /// Names of all steps the plan addresses.
    pub fn steps(&self) -> Vec<&str> {
        match self {
            Self::Skip(_) => Vec::new(),
            Self::Flag(steps) => steps.iter().map(String::as_str).collect(),
            Self::Messages { targets, .. } => targets.iter().map(|t| t.step.as_str()).collect(),
        }
    }
}

/// Plan the hints a step invocation sends on its own behalf.
pub fn plan_hints<R: Rng + ?Sized>(
    mode: OptimizationMode,
    workflow: &WorkflowDefinition,
    current_step: &str,
    cold: bool,
    rng: &mut R,
) -> HintPlan {
    if !cold {
        return HintPlan::Skip(format!("step {current_step} ran warm, no hints sent"));
    }

    let Some(step) = workflow.step(current_step) else {
        return HintPlan::Skip(format!(
            "step {current_step} is not part of workflow {}",
            workflow.name
        ));
    };
    let is_start = workflow.is_start(current_step);

    match mode {
        OptimizationMode::Disabled => HintPlan::Skip("optimization disabled, no hints sent".into()),
        OptimizationMode::ReportOnly => HintPlan::Skip("report-only mode, no hints sent".into()),
        OptimizationMode::Naive if !is_start => HintPlan::Skip(format!(
            "naive hinting only runs from the first step ({}), this is {current_step}",
            workflow.start_at
        )),
        OptimizationMode::Naive | OptimizationMode::NaiveAlways => {
            HintPlan::Flag(workflow.other_steps(current_step).map(str::to_owned).collect())
        }
        OptimizationMode::Heuristic => {
            let mut targets: Vec<_> = workflow
                .siblings(&step.provider, current_step)
                .map(HintTarget::direct)
                .collect();
            for provider in workflow.providers().into_iter().filter(|p| **p != step.provider) {
                targets.extend(
                    workflow
                        .steps_on(provider)
                        .map(|name| HintTarget::proxy_on(workflow, name, provider, &step.provider)),
                );
            }
            HintPlan::Messages { targets, counter: 0 }
        }
        OptimizationMode::HeuristicProviderSeparation => {
            let mut targets: Vec<_> = workflow
                .siblings(&step.provider, current_step)
                .map(HintTarget::direct)
                .collect();
            for provider in workflow.providers().into_iter().filter(|p| **p != step.provider) {
                let candidates: Vec<&str> = workflow.steps_on(provider).collect();
                if let Some(pick) = candidates.choose(&mut *rng) {
                    targets.push(HintTarget::proxy_on(workflow, pick, provider, &step.provider));
                }
            }
            if is_start {
                if let Some(first) = targets.first_mut() {
                    first.blocking = true;
                }
            }
            HintPlan::Messages { targets, counter: 0 }
        }
    }
}

/// Plan the propagation a cold proxy-hint receiver owes.
///
/// Siblings of the addressed step on its provider are hinted with the
/// incremented counter. When the message designates another provider, one of
/// its steps additionally receives a proxy hint, itself designating the
/// provider after that one. Nothing is sent once the counter has reached
/// `ceiling`.
pub fn plan_fan_out<R: Rng + ?Sized>(
    message: &HintMessage,
    workflow: &WorkflowDefinition,
    ceiling: u32,
    rng: &mut R,
) -> HintPlan {
    if !message.hint_proxy || !message.optimization_mode.propagates() {
        return HintPlan::Skip("hint does not ask for propagation".into());
    }
    if message.recursive_hint_counter >= ceiling {
        return HintPlan::Skip(format!(
            "recursion ceiling {ceiling} reached, propagation stops"
        ));
    }
    let Some(step) = workflow.step(&message.step_name) else {
        return HintPlan::Skip(format!(
            "step {} is not part of workflow {}",
            message.step_name, workflow.name
        ));
    };

    let mut targets: Vec<_> = workflow
        .siblings(&step.provider, &message.step_name)
        .map(HintTarget::proxy)
        .collect();

    if let Some(designated) = message.provider.as_ref().filter(|p| **p != step.provider) {
        let candidates: Vec<&str> = workflow.steps_on(designated).collect();
        if let Some(pick) = candidates.choose(&mut *rng) {
            targets.push(HintTarget::proxy_on(workflow, pick, designated, &step.provider));
        }
    }

    HintPlan::Messages {
        targets,
        counter: message.recursive_hint_counter + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hint::TriggeredFrom;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    /// a(start, aws) -> b(openWhisk) -> c(aws) -> d(openWhisk, end)
    fn workflow() -> WorkflowDefinition {
        serde_json::from_value(json!({
            "name": "wf",
            "startAt": "a",
            "workflow": {
                "a": { "type": "Task", "provider": "aws", "functionEndpoint": { "hostname": "a", "path": "/" }, "next": "b" },
                "b": { "type": "Task", "provider": "openWhisk", "functionEndpoint": { "hostname": "b", "path": "/" }, "next": "c" },
                "c": { "type": "Task", "provider": "aws", "functionEndpoint": { "hostname": "c", "path": "/" }, "next": "d" },
                "d": { "type": "Task", "provider": "openWhisk", "functionEndpoint": { "hostname": "d", "path": "/" }, "end": true }
            }
        }))
        .unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn proxy_message(step: &str, counter: u32) -> HintMessage {
        HintMessage {
            triggered_from: TriggeredFrom::default(),
            optimization_mode: OptimizationMode::Heuristic,
            step_name: step.into(),
            hint_proxy: true,
            recursive_hint_counter: counter,
            workflow_name: "wf".into(),
            provider: None,
        }
    }

    #[test]
    fn disabled_report_only_and_warm_send_nothing() {
        let wf = workflow();
        assert!(plan_hints(OptimizationMode::Disabled, &wf, "a", true, &mut rng()).is_skip());
        assert!(plan_hints(OptimizationMode::ReportOnly, &wf, "a", true, &mut rng()).is_skip());
        for mode in [
            OptimizationMode::Naive,
            OptimizationMode::NaiveAlways,
            OptimizationMode::Heuristic,
            OptimizationMode::HeuristicProviderSeparation,
        ] {
            assert!(plan_hints(mode, &wf, "a", false, &mut rng()).is_skip(), "mode {mode}");
        }
    }

    #[test]
    fn naive_hints_everyone_from_start_only() {
        let wf = workflow();
        assert_eq!(
            plan_hints(OptimizationMode::Naive, &wf, "a", true, &mut rng()),
            HintPlan::Flag(vec!["b".into(), "c".into(), "d".into()])
        );
        assert!(plan_hints(OptimizationMode::Naive, &wf, "b", true, &mut rng()).is_skip());
    }

    #[test]
    fn naive_always_hints_from_any_cold_step() {
        let wf = workflow();
        assert_eq!(
            plan_hints(OptimizationMode::NaiveAlways, &wf, "c", true, &mut rng()).steps(),
            vec!["a", "b", "d"]
        );
    }

    #[test]
    fn heuristic_hints_siblings_and_proxies_other_provider() {
        let wf = workflow();
        let plan = plan_hints(OptimizationMode::Heuristic, &wf, "a", true, &mut rng());
        let HintPlan::Messages { targets, counter } = plan else {
            panic!("expected messages");
        };
        assert_eq!(counter, 0);
        assert_eq!(
            targets,
            vec![
                HintTarget::direct("c"),
                HintTarget::proxy("b"),
                HintTarget::proxy("d"),
            ]
        );
    }

    #[test]
    fn provider_separation_sends_one_proxy_and_blocks_first_from_start() {
        let wf = workflow();
        for seed in 0..16 {
            let plan = plan_hints(
                OptimizationMode::HeuristicProviderSeparation,
                &wf,
                "a",
                true,
                &mut StdRng::seed_from_u64(seed),
            );
            let HintPlan::Messages { targets, .. } = plan else {
                panic!("expected messages");
            };
            let proxies: Vec<_> = targets.iter().filter(|t| t.proxy).collect();
            assert_eq!(proxies.len(), 1);
            assert!(["b", "d"].contains(&proxies[0].step.as_str()));
            assert_eq!(targets[0].step, "c");
            assert!(targets[0].blocking);
            assert_eq!(targets.iter().filter(|t| t.blocking).count(), 1);
        }

        let HintPlan::Messages { targets, .. } =
            plan_hints(OptimizationMode::HeuristicProviderSeparation, &wf, "c", true, &mut rng())
        else {
            panic!("expected messages");
        };
        assert!(targets.iter().all(|t| !t.blocking));
    }

    #[test]
    fn fan_out_increments_counter_and_hints_siblings() {
        let wf = workflow();
        let plan = plan_fan_out(&proxy_message("b", 0), &wf, 3, &mut rng());
        assert_eq!(
            plan,
            HintPlan::Messages {
                targets: vec![HintTarget::proxy("d")],
                counter: 1
            }
        );
    }

    #[test]
    fn fan_out_stops_at_ceiling() {
        let wf = workflow();
        assert!(!plan_fan_out(&proxy_message("b", 2), &wf, 3, &mut rng()).is_skip());
        assert!(plan_fan_out(&proxy_message("b", 3), &wf, 3, &mut rng()).is_skip());
        assert!(plan_fan_out(&proxy_message("b", 1), &wf, 1, &mut rng()).is_skip());
    }

    #[test]
    fn fan_out_requires_proxy_in_propagating_mode() {
        let wf = workflow();
        let mut message = proxy_message("b", 0);
        message.hint_proxy = false;
        assert!(plan_fan_out(&message, &wf, 3, &mut rng()).is_skip());

        let mut message = proxy_message("b", 0);
        message.optimization_mode = OptimizationMode::NaiveAlways;
        assert!(plan_fan_out(&message, &wf, 3, &mut rng()).is_skip());
    }

    #[test]
    fn fan_out_forwards_to_designated_provider() {
        let wf = workflow();
        let mut message = proxy_message("b", 1);
        message.provider = Some(Provider::Aws);
        let plan = plan_fan_out(&message, &wf, 3, &mut rng());
        let HintPlan::Messages { targets, counter } = plan else {
            panic!("expected messages");
        };
        assert_eq!(counter, 2);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].step, "d");
        assert!(["a", "c"].contains(&targets[1].step.as_str()));
        assert_eq!(targets[1].designate, None);

        message.provider = Some(Provider::OpenWhisk);
        assert_eq!(plan_fan_out(&message, &wf, 3, &mut rng()).steps(), vec!["d"]);
    }

    #[test]
    fn proxy_targets_designate_the_following_provider() {
        let wf: WorkflowDefinition = serde_json::from_value(json!({
            "name": "tri",
            "startAt": "x",
            "workflow": {
                "x": { "type": "Task", "provider": "aws", "functionEndpoint": { "hostname": "x", "path": "/" }, "next": "y" },
                "y": { "type": "Task", "provider": "openWhisk", "functionEndpoint": { "hostname": "y", "path": "/" }, "next": "z" },
                "z": { "type": "Task", "provider": "azure", "functionEndpoint": { "hostname": "z", "path": "/" }, "end": true }
            }
        }))
        .unwrap();

        let HintPlan::Messages { targets, .. } =
            plan_hints(OptimizationMode::Heuristic, &wf, "x", true, &mut rng())
        else {
            panic!("expected messages");
        };
        assert_eq!(targets[0].step, "y");
        assert_eq!(targets[0].designate, Some(Provider::Other("azure".into())));
        assert_eq!(targets[1].step, "z");
        assert_eq!(targets[1].designate, None);

        // The sender's own provider is never designated.
        let HintPlan::Messages { targets, .. } =
            plan_hints(OptimizationMode::Heuristic, &wf, "y", true, &mut rng())
        else {
            panic!("expected messages");
        };
        assert_eq!(targets[0].step, "x");
        assert_eq!(targets[0].designate, Some(Provider::Other("azure".into())));
        assert_eq!(targets[1].step, "z");
        assert_eq!(targets[1].designate, None);

        let mut message = proxy_message("y", 0);
        message.provider = Some(Provider::Other("azure".into()));
        let HintPlan::Messages { targets, .. } = plan_fan_out(&message, &wf, 3, &mut rng()) else {
            panic!("expected messages");
        };
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].step, "z");
        assert_eq!(targets[0].designate, None);
    }

    #[test]
    fn blocking_targets_split_from_the_rest() {
        let wf = workflow();
        let mode = OptimizationMode::HeuristicProviderSeparation;
        let plan = plan_hints(mode, &wf, "a", true, &mut rng());
        let (blocking, rest) = plan.split_blocking();
        assert_eq!(blocking.unwrap().steps(), vec!["c"]);
        let rest_steps = rest.steps();
        assert_eq!(rest_steps.len(), 1);
        assert!(["b", "d"].contains(&rest_steps[0]));

        let plan = plan_hints(OptimizationMode::Heuristic, &wf, "a", true, &mut rng());
        let (blocking, rest) = plan.clone().split_blocking();
        assert!(blocking.is_none());
        assert_eq!(rest, plan);
    }
}
