//! Workflow validation: run this before a definition is used for execution.
//!
//! Rules enforced:
//! 1. `startAt` names a step of the workflow.
//! 2. Every `next` (static or choice) references a step of the workflow.
//! 3. Non-terminal `Task` steps declare `next`; `ChoiceTask` steps declare at
//!    least one choice.
//! 4. A terminal step's `finishQueue`, if present, has a queue URL.
//!
//! Returns the steps reachable from `startAt` in breadth-first order on success.

use std::collections::{HashSet, VecDeque};

use crate::models::{StepType, WorkflowDefinition};
use crate::EngineError;

fn invalid(workflow: &WorkflowDefinition, reason: String) -> EngineError {
    EngineError::InvalidDefinition {
        workflow: workflow.name.clone(),
        reason,
    }
}

/// Validate the workflow and return its reachable steps from `startAt`.
///
/// # Errors
/// [`EngineError::InvalidDefinition`] naming the first violated rule.
pub fn validate_workflow(workflow: &WorkflowDefinition) -> Result<Vec<String>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Entry step exists
    // -----------------------------------------------------------------------
    if workflow.step(&workflow.start_at).is_none() {
        return Err(invalid(
            workflow,
            format!("startAt references unknown step '{}'", workflow.start_at),
        ));
    }

    for (name, step) in &workflow.workflow {
        // -------------------------------------------------------------------
        // 2. Successor references resolve
        // -------------------------------------------------------------------
        let successors = step
            .next
            .iter()
            .chain(step.choices.iter().map(|c| &c.next));
        for next in successors {
            if workflow.step(next).is_none() {
                return Err(invalid(
                    workflow,
                    format!("step '{name}' references unknown step '{next}'"),
                ));
            }
        }

        // -------------------------------------------------------------------
        // 3. Non-terminal steps can make progress
        // -------------------------------------------------------------------
        if !step.end {
            match step.step_type {
                StepType::Task if step.next.is_none() => {
                    return Err(invalid(
                        workflow,
                        format!("task '{name}' is not terminal and declares no next step"),
                    ));
                }
                StepType::ChoiceTask if step.choices.is_empty() => {
                    return Err(invalid(
                        workflow,
                        format!("choice task '{name}' declares no choices"),
                    ));
                }
                _ => {}
            }
        }

        // -------------------------------------------------------------------
        // 4. Completion queue is addressable
        // -------------------------------------------------------------------
        if let Some(queue) = &step.finish_queue {
            if queue.queue_url.trim().is_empty() {
                return Err(invalid(
                    workflow,
                    format!("step '{name}' declares a finishQueue without queueUrl"),
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reachability walk from the entry step
    // -----------------------------------------------------------------------
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([workflow.start_at.as_str()]);
    let mut order: Vec<String> = Vec::with_capacity(workflow.workflow.len());

    while let Some(name) = queue.pop_front() {
        if !visited.insert(name) {
            continue;
        }
        order.push(name.to_owned());

        if let Some(step) = workflow.step(name) {
            if step.end {
                continue;
            }
            for next in step.next.iter().chain(step.choices.iter().map(|c| &c.next)) {
                if !visited.contains(next.as_str()) {
                    queue.push_back(next.as_str());
                }
            }
        }
    }

    Ok(order)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow(value: serde_json::Value) -> WorkflowDefinition {
        serde_json::from_value(value).expect("workflow json")
    }

    fn task(next: Option<&str>, end: bool) -> serde_json::Value {
        let mut step = json!({
            "type": "Task",
            "provider": "aws",
            "functionEndpoint": { "hostname": "h", "path": "/p" },
            "inputPath": "in",
            "resultPath": "out",
            "end": end
        });
        if let Some(next) = next {
            step["next"] = json!(next);
        }
        step
    }

    #[test]
    fn linear_workflow_returns_reachable_order() {
        // A → B → C
        let wf = workflow(json!({
            "name": "linear",
            "startAt": "a",
            "workflow": { "a": task(Some("b"), false), "b": task(Some("c"), false), "c": task(None, true) }
        }));
        assert_eq!(validate_workflow(&wf).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn choice_branches_are_walked_once() {
        //      a
        //     / \
        //    b   c
        //     \ /
        //      d
        let wf = workflow(json!({
            "name": "branching",
            "startAt": "a",
            "workflow": {
                "a": {
                    "type": "ChoiceTask",
                    "provider": "aws",
                    "functionEndpoint": { "hostname": "h", "path": "/p" },
                    "choices": [
                        { "variable": "v", "condition": "x", "choiceType": "stringEquals", "next": "b" },
                        { "variable": "v", "condition": "y", "choiceType": "stringEquals", "next": "c" }
                    ]
                },
                "b": task(Some("d"), false),
                "c": task(Some("d"), false),
                "d": task(None, true)
            }
        }));
        let order = validate_workflow(&wf).unwrap();
        assert_eq!(order.first().unwrap(), "a");
        assert_eq!(order.last().unwrap(), "d");
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn unknown_start_step_is_rejected() {
        let wf = workflow(json!({
            "name": "bad",
            "startAt": "ghost",
            "workflow": { "a": task(None, true) }
        }));
        assert!(matches!(
            validate_workflow(&wf),
            Err(EngineError::InvalidDefinition { reason, .. }) if reason.contains("ghost")
        ));
    }

    #[test]
    fn dangling_next_is_rejected() {
        let wf = workflow(json!({
            "name": "bad",
            "startAt": "a",
            "workflow": { "a": task(Some("ghost"), false) }
        }));
        assert!(validate_workflow(&wf).is_err());
    }

    #[test]
    fn non_terminal_task_without_next_is_rejected() {
        let wf = workflow(json!({
            "name": "bad",
            "startAt": "a",
            "workflow": { "a": task(None, false) }
        }));
        assert!(matches!(
            validate_workflow(&wf),
            Err(EngineError::InvalidDefinition { reason, .. }) if reason.contains("no next step")
        ));
    }

    #[test]
    fn cycles_through_choices_are_allowed() {
        let wf = workflow(json!({
            "name": "loop",
            "startAt": "a",
            "workflow": {
                "a": {
                    "type": "ChoiceTask",
                    "provider": "aws",
                    "functionEndpoint": { "hostname": "h", "path": "/p" },
                    "choices": [
                        { "variable": "again", "condition": "yes", "choiceType": "stringEquals", "next": "a" },
                        { "variable": "again", "condition": "no", "choiceType": "stringEquals", "next": "b" }
                    ]
                },
                "b": task(None, true)
            }
        }));
        assert_eq!(validate_workflow(&wf).unwrap(), vec!["a", "b"]);
    }
}
