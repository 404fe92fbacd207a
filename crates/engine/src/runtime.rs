//! Function runtime.
//!
//! `FunctionRuntime` is the per-instance context every invocation runs in:
//! 1. Classifies the instance cold or warm.
//! 2. Answers hints, fanning proxy hints out when the instance was cold.
//! 3. For workflow steps, rebuilds the execution state from the inbound
//!    snapshot and starts hints and reports alongside the user handler.
//! 4. Records the handler result, dispatches the next step, and answers once
//!    the dispatch (and a blocking hint, if the mode sends one) has returned.
//!
//! Fire-and-forget hints and reports run as detached tasks. The step answers
//! without waiting for them; their failures are only logged.

use std::path::PathBuf;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use handlers::StepHandler;
use providers::{
    LambdaInvoker, OpenWhiskCredentials, OpenWhiskInvoker, Provider, ProviderRegistry,
};
use queue::{CompletionSink, HttpQueueSink};

use crate::catalog::WorkflowCatalog;
use crate::clock::{CorrectedClock, SntpOffset};
use crate::coldstart::{ColdStartTracker, InstanceClassification};
use crate::config::RuntimeConfig;
use crate::dispatcher::{DispatchOutcome, StepDispatcher};
use crate::hint::receiver::{acknowledge, owes_fan_out, receiver_origin};
use crate::hint::{
    HintAck, HintCoordinator, HintMessage, HintOrigin, HintOutcome, HintPlan, TriggeredFrom,
};
use crate::join::{join_designated, JoinMember};
use crate::report::{should_report, HttpMonitor, ReportSink, StepReport};
use crate::state::{ExecutionState, HopContext, StateSnapshot};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Facts about the current invocation supplied by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HopMetadata {
    pub function_execution_id: String,
    /// Free-form provider metadata recorded in the execution history.
    pub step_metadata: Value,
    pub remaining_time: Option<Duration>,
}

impl HopMetadata {
    pub fn new(function_execution_id: impl Into<String>) -> Self {
        Self {
            function_execution_id: function_execution_id.into(),
            ..Default::default()
        }
    }
}

/// An inbound invocation body.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundRequest {
    HintFlag,
    Hint(HintMessage),
    Step(StateSnapshot),
}

impl InboundRequest {
    /// Classify a request body.
    ///
    /// # Errors
    /// [`EngineError::MalformedRequest`] for bodies that are neither a hint nor
    /// a workflow state, or whose hint/state does not parse.
    pub fn from_json(body: Value) -> Result<Self, EngineError> {
        let Value::Object(mut fields) = body else {
            return Err(EngineError::MalformedRequest("body is not a JSON object".into()));
        };

        if fields.get("hintFlag").and_then(Value::as_bool) == Some(true) {
            return Ok(Self::HintFlag);
        }
        if let Some(message) = fields.remove("hintMessage") {
            let message = serde_json::from_value(message)
                .map_err(|e| EngineError::MalformedRequest(format!("invalid hintMessage: {e}")))?;
            return Ok(Self::Hint(message));
        }
        if let Some(state) = fields.remove("workflowState") {
            let snapshot = serde_json::from_value(state)
                .map_err(|e| EngineError::MalformedRequest(format!("invalid workflowState: {e}")))?;
            return Ok(Self::Step(snapshot));
        }

        Err(EngineError::MalformedRequest(
            "expected one of hintFlag, hintMessage or workflowState".into(),
        ))
    }
}

/// Result of a step invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCompletion {
    pub workflow_state: StateSnapshot,
    pub dispatch: DispatchOutcome,
    /// Outcome of the blocking hint, when the mode sends one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<HintOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InvocationResponse {
    Hint(HintAck),
    Step(StepCompletion),
}

/// Values produced by the awaited parts of a step invocation.
enum SideResult {
    Hints(HintOutcome),
    Dispatched(DispatchOutcome),
}

// ---------------------------------------------------------------------------
// FunctionRuntime
// ---------------------------------------------------------------------------

pub struct FunctionRuntime {
    tracker: ColdStartTracker,
    workflows_path: PathBuf,
    catalog: OnceCell<Arc<WorkflowCatalog>>,
    dispatcher: StepDispatcher,
    hints: Arc<HintCoordinator>,
    reporter: Option<Arc<dyn ReportSink>>,
    clock: Arc<CorrectedClock>,
    hint_hold: Duration,
    detached: Mutex<JoinSet<()>>,
}

impl FunctionRuntime {
    /// Runtime over the given invokers and completion sink, loading workflow
    /// definitions from `config.workflows_path` on first use.
    pub fn new(
        providers: ProviderRegistry,
        sink: Option<Arc<dyn CompletionSink>>,
        config: &RuntimeConfig,
    ) -> Self {
        let providers = Arc::new(providers);
        Self {
            tracker: ColdStartTracker::new(),
            workflows_path: config.workflows_path.clone(),
            catalog: OnceCell::new(),
            dispatcher: StepDispatcher::new(Arc::clone(&providers), sink),
            hints: Arc::new(HintCoordinator::new(providers, config.hint)),
            reporter: None,
            clock: Arc::new(CorrectedClock::system()),
            hint_hold: config.hint_hold,
            detached: Mutex::new(JoinSet::new()),
        }
    }

    /// Runtime wired to the HTTP provider adapters, queue and monitor.
    pub fn from_config(config: &RuntimeConfig) -> anyhow::Result<Self> {
        let credentials = config
            .openwhisk_auth
            .clone()
            .map(|(api_key, api_password)| OpenWhiskCredentials {
                api_key,
                api_password,
            })
            .unwrap_or_default();

        let mut providers = ProviderRegistry::new();
        providers.insert(Provider::Aws, Arc::new(LambdaInvoker::new(config.http_timeout)?));
        providers.insert(
            Provider::OpenWhisk,
            Arc::new(OpenWhiskInvoker::new(credentials, config.http_timeout)?),
        );

        let sink: Arc<dyn CompletionSink> = Arc::new(HttpQueueSink::new(config.http_timeout)?);
        let mut runtime = Self::new(providers, Some(sink), config);

        if let Some(url) = &config.monitor_url {
            let monitor = HttpMonitor::new(url, config.http_timeout)?;
            runtime = runtime.with_reporter(Arc::new(monitor));
        }
        if let Some(server) = &config.ntp_server {
            let source = SntpOffset::new(server, Duration::from_secs(2));
            runtime = runtime.with_clock(CorrectedClock::new(source));
        }
        Ok(runtime)
    }

    /// Serve an already-loaded catalog instead of reading the workflow file.
    pub fn with_catalog(mut self, catalog: WorkflowCatalog) -> Self {
        self.catalog = OnceCell::from(Arc::new(catalog));
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ReportSink>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_clock(mut self, clock: CorrectedClock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn tracker(&self) -> &ColdStartTracker {
        &self.tracker
    }

    pub fn clock(&self) -> &CorrectedClock {
        &self.clock
    }

    /// Workflow definitions, read from disk on the first call.
    pub async fn catalog(&self) -> Result<Arc<WorkflowCatalog>, EngineError> {
        self.catalog
            .get_or_try_init(|| async {
                WorkflowCatalog::load(&self.workflows_path).await.map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }

    /// Serve one invocation.
    ///
    /// # Errors
    /// Hints never fail. Step invocations fail with the error of the state
    /// machine, the handler, or the next-step dispatch.
    #[instrument(skip_all, fields(function_execution_id = %hop.function_execution_id))]
    pub async fn handle(
        &self,
        request: InboundRequest,
        handler: &dyn StepHandler,
        hop: HopMetadata,
    ) -> Result<InvocationResponse, EngineError> {
        match request {
            InboundRequest::HintFlag => {
                Ok(InvocationResponse::Hint(self.receive_hint(None, &hop).await))
            }
            InboundRequest::Hint(message) => {
                Ok(InvocationResponse::Hint(self.receive_hint(Some(message), &hop).await))
            }
            InboundRequest::Step(snapshot) => {
                let result = self.run_step(snapshot, handler, &hop).await;
                self.clock.mark_end().await;
                if let Err(e) = &result {
                    error!("workflow step failed: {e}");
                }
                result.map(InvocationResponse::Step)
            }
        }
    }

    /// Wait for every detached hint and report task started so far.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.lock_detached());
        while pending.join_next().await.is_some() {}
    }

    fn lock_detached(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.detached.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `future` on its own task; the caller does not wait for it.
    fn detach<F>(&self, label: &'static str, future: F)
    where
        F: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let mut detached = self.lock_detached();
        while detached.try_join_next().is_some() {}
        detached.spawn(async move {
            if let Err(e) = future.await {
                warn!(operation = label, "fire-and-forget operation failed: {e}");
            }
        });
    }

    // -----------------------------------------------------------------------
    // Hints
    // -----------------------------------------------------------------------

    async fn receive_hint(&self, message: Option<HintMessage>, hop: &HopMetadata) -> HintAck {
        let classification = self.tracker.classify();
        if classification.cold_execution && !self.hint_hold.is_zero() {
            tokio::time::sleep(self.hint_hold).await;
        }

        let mut ack = acknowledge(&classification, &hop.function_execution_id, message.as_ref());

        if let Some(message) = message.as_ref().filter(|m| owes_fan_out(&classification, m)) {
            ack.fan_out = self.fan_out(&classification, message, hop).await;
        }

        info!(hint = %log_field(&ack), "LOG_WORKFLOW_HINT");
        ack
    }

    async fn fan_out(
        &self,
        classification: &InstanceClassification,
        message: &HintMessage,
        hop: &HopMetadata,
    ) -> Option<HintOutcome> {
        let workflow = match self
            .catalog()
            .await
            .and_then(|catalog| catalog.find(&message.workflow_name))
        {
            Ok(workflow) => workflow,
            Err(e) => {
                warn!("hint propagation skipped: {e}");
                return None;
            }
        };

        let origin = receiver_origin(classification, &hop.function_execution_id, message);
        Some(self.hints.fan_out(&workflow, message, origin).await)
    }

    // -----------------------------------------------------------------------
    // Workflow steps
    // -----------------------------------------------------------------------

    async fn run_step(
        &self,
        snapshot: StateSnapshot,
        handler: &dyn StepHandler,
        hop: &HopMetadata,
    ) -> Result<StepCompletion, EngineError> {
        let classification = self.tracker.classify();
        let catalog = self.catalog().await?;

        let context = HopContext {
            function_execution_id: hop.function_execution_id.clone(),
            step_metadata: hop.step_metadata.clone(),
            cold_execution: classification.cold_execution,
            function_instance_uuid: classification.instance_uuid.clone(),
        };
        let mut state = ExecutionState::initialize(Some(snapshot), &catalog, &context)?;
        info!(
            workflow = %state.workflow_name,
            execution_uuid = %state.execution_uuid,
            step = %state.current_step,
            cold = classification.cold_execution,
            "running workflow step"
        );

        let mut members = Vec::new();
        if classification.cold_execution {
            if let Some(member) = self.start_hints(&state, hop) {
                members.push(member);
            }
        }
        if should_report(&state) {
            self.start_report(&state, hop);
        }

        let output = handler.call(state.this_step_input()).resolve().await?;
        state.set_results(output)?;

        let dispatcher = self.dispatcher.clone();
        let dispatch_state = state.clone();
        members.push(JoinMember::blocking("dispatch", async move {
            dispatcher
                .trigger_next(&dispatch_state)
                .await
                .map(SideResult::Dispatched)
        }));

        let mut dispatch = None;
        let mut hints = None;
        for value in join_designated(members).await?.into_iter().flatten() {
            match value {
                SideResult::Dispatched(outcome) => dispatch = Some(outcome),
                SideResult::Hints(outcome) => hints = Some(outcome),
            }
        }
        let dispatch = dispatch.ok_or_else(|| EngineError::TaskAborted("dispatch".into()))?;

        let workflow_state = state.snapshot();
        info!(workflow_state = %log_field(&workflow_state), "LOG_WORKFLOW_STATE");

        Ok(StepCompletion {
            workflow_state,
            dispatch,
            hints,
        })
    }

    /// Start the hints a cold step owes.
    ///
    /// Fire-and-forget sends are detached. A blocking hint comes back as a
    /// join member so the step waits for its answer; it never fails the join.
    fn start_hints(
        &self,
        state: &ExecutionState,
        hop: &HopMetadata,
    ) -> Option<JoinMember<SideResult>> {
        let workflow = Arc::clone(state.workflow());
        let origin = HintOrigin {
            triggered_from: TriggeredFrom {
                function_execution_id: hop.function_execution_id.clone(),
                function_instance_uuid: state.function_instance_uuid.clone(),
                step: state.current_step.clone(),
                execution_uuid: state.execution_uuid.clone(),
            },
            workflow_name: state.workflow_name.clone(),
            optimization_mode: state.optimization_mode,
        };

        let plan = self.hints.plan_for_step(&workflow, &origin, true);
        if let HintPlan::Skip(reason) = &plan {
            debug!("{reason}");
            return None;
        }
        let (blocking, rest) = plan.split_blocking();

        let coordinator = Arc::clone(&self.hints);
        let (detached_workflow, detached_origin) = (Arc::clone(&workflow), origin.clone());
        self.detach("hints", async move {
            coordinator
                .execute(&detached_workflow, &detached_origin, rest)
                .await;
            Ok(())
        });

        let coordinator = Arc::clone(&self.hints);
        blocking.map(|plan| {
            JoinMember::fire_and_forget("blocking hint", async move {
                let outcome = coordinator.execute(&workflow, &origin, plan).await;
                Ok(SideResult::Hints(outcome))
            })
        })
    }

    fn start_report(&self, state: &ExecutionState, hop: &HopMetadata) {
        let Some(reporter) = self.reporter.clone() else {
            return;
        };
        let clock = Arc::clone(&self.clock);
        let previous_end = clock.last_end_time();
        let state = state.clone();
        let function_execution_id = hop.function_execution_id.clone();
        let remaining_time = hop.remaining_time;

        self.detach("report", async move {
            let started = clock.now().await;
            let report = StepReport::for_hop(
                &state,
                &function_execution_id,
                started,
                previous_end,
                remaining_time,
            );
            reporter.report(&report).await.map_err(EngineError::from)
        });
    }
}

/// JSON text of `value` for a log field, or the reason it could not be encoded.
fn log_field(value: &impl Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

impl std::fmt::Debug for FunctionRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRuntime")
            .field("workflows_path", &self.workflows_path)
            .field("instance", &self.tracker.identity())
            .field("dispatcher", &self.dispatcher)
            .field("hints", &self.hints)
            .field("reporter", &self.reporter.is_some())
            .finish_non_exhaustive()
    }
}
