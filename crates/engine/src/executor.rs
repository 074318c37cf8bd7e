//! Flow execution engine.
//!
//! `FlowExecutor` is the interpreter loop:
//! 1. Starts at the first trigger node of the flow.
//! 2. Dispatches each node to its `BlockHandler` through the registry.
//! 3. Merges the handler result into the run's `FlowContext`.
//! 4. Follows the edge matching the handler's output label, or the default edge.
//! 5. Stops when no edge matches, a node or handler is missing, or the step
//!    budget runs out.
//!
//! Context and trace are locals of [`FlowExecutor::execute`]; the executor
//! itself only holds the read-only registry and config, so one instance can
//! serve any number of concurrent runs.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, instrument, warn, Span};
use uuid::Uuid;

use nodes::context::LAST_RESPONSE;
use nodes::{
    BlockHandler, ChatMessage, Collaborators, FlowContext, HandlerData, HandlerError,
    HandlerResult, Source, Variables,
};

use crate::graph::FlowIndex;
use crate::models::{FlowGraph, Node};
use crate::registry::HandlerRegistry;
use crate::trace::ExecutionStep;
use crate::EngineError;

/// Output label of the fallback result that replaces a failed handler.
pub const OUTPUT_ERROR: &str = "error";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Steps a run may take before it is cut short. Overridable per run.
    pub max_steps: usize,
    /// Convert handler errors, panics and timeouts into a fallback result
    /// routed via [`OUTPUT_ERROR`]. When false they abort the run.
    pub recover_handler_failures: bool,
    /// Upper bound for a single handler invocation.
    pub handler_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            recover_handler_failures: true,
            handler_timeout: None,
        }
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Dry run from the flow builder; exposed to handlers via the context.
    pub sandbox: bool,
    /// Record an [`ExecutionStep`] per visited node.
    pub trace_execution: bool,
    pub agent_id: Option<String>,
    pub conversation_id: Option<String>,
    /// Overrides [`ExecutorConfig::max_steps`].
    pub max_steps: Option<usize>,
    /// Earlier turns, copied into the context.
    pub conversation_history: Vec<ChatMessage>,
    /// Aborts the run when cancelled.
    pub cancel: Option<CancellationToken>,
    /// Aborts the run once reached.
    pub deadline: Option<Instant>,
}

impl ExecuteOptions {
    pub fn traced(mut self) -> Self {
        self.trace_execution = true;
        self
    }

    pub fn sandboxed(mut self) -> Self {
        self.sandbox = true;
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.conversation_history = history;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

// ---------------------------------------------------------------------------
// Output of a completed run
// ---------------------------------------------------------------------------

/// The result of running a flow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowExecutionResult {
    pub execution_id: Uuid,
    /// Last message produced by any handler; empty when none was.
    pub final_response: String,
    /// Every source collected, in traversal order, without deduplication.
    pub sources: Vec<Source>,
    /// Empty unless tracing was requested.
    pub trace: Vec<ExecutionStep>,
    pub variables: Variables,
    pub steps_executed: usize,
    /// True when the step budget ran out before the walk ended.
    pub truncated: bool,
}

impl FlowExecutionResult {
    /// The final response, or `fallback` when the flow produced none.
    pub fn response_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.final_response.is_empty() {
            fallback
        } else {
            &self.final_response
        }
    }
}

// ---------------------------------------------------------------------------
// Handler failures
// ---------------------------------------------------------------------------

enum Failure {
    Error(HandlerError),
    Panic(String),
    TimedOut(Duration),
}

impl Failure {
    fn describe(&self) -> String {
        match self {
            Failure::Error(err) => err.to_string(),
            Failure::Panic(msg) => format!("panicked: {msg}"),
            Failure::TimedOut(limit) => format!("timed out after {limit:?}"),
        }
    }

    fn into_engine_error(self, node: &Node) -> EngineError {
        let node_id = node.id.clone();
        let block_id = node.block_id.clone();
        match self {
            Failure::Error(source) => EngineError::Handler { node_id, block_id, source },
            Failure::Panic(message) => EngineError::HandlerPanicked { node_id, block_id, message },
            Failure::TimedOut(limit) => EngineError::Handler {
                node_id,
                block_id,
                source: HandlerError::Other(anyhow::anyhow!("timed out after {limit:?}")),
            },
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "non-string panic payload".to_string()),
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// FlowExecutor
// ---------------------------------------------------------------------------

/// Stateless interpreter that walks flow graphs.
///
/// Construct one executor per process and call [`FlowExecutor::execute`]
/// with the flow and the inbound message.
#[derive(Debug, Clone)]
pub struct FlowExecutor {
    registry: Arc<HandlerRegistry>,
    config: ExecutorConfig,
}

impl FlowExecutor {
    pub fn new(registry: HandlerRegistry, config: ExecutorConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    /// Executor with every bundled block and the default config.
    pub fn with_defaults(collaborators: &Collaborators) -> Self {
        Self::new(HandlerRegistry::with_defaults(collaborators), ExecutorConfig::default())
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the flow for `message` and return what it produced.
    ///
    /// # Errors
    /// - [`EngineError::NoTriggerFound`] before any handler runs.
    /// - [`EngineError::Cancelled`] / [`EngineError::DeadlineExceeded`] when
    ///   the options say to stop.
    /// - [`EngineError::Handler`] / [`EngineError::HandlerPanicked`] only
    ///   when failure recovery is disabled.
    #[instrument(
        skip_all,
        fields(execution_id = field::Empty, agent_id = options.agent_id.as_deref().unwrap_or("-"))
    )]
    pub async fn execute(
        &self,
        graph: &FlowGraph,
        message: &str,
        options: ExecuteOptions,
    ) -> Result<FlowExecutionResult, EngineError> {
        let trigger = graph.trigger().ok_or(EngineError::NoTriggerFound)?;
        let index = FlowIndex::new(graph);

        let execution_id = Uuid::new_v4();
        Span::current().record("execution_id", field::display(execution_id));

        let ExecuteOptions {
            sandbox,
            trace_execution,
            agent_id,
            conversation_id,
            max_steps,
            conversation_history,
            cancel,
            deadline,
        } = options;

        let mut ctx = FlowContext {
            message: message.to_owned(),
            variables: Variables::new(),
            conversation_history,
            sources: Vec::new(),
            agent_id,
            conversation_id,
            sandbox,
        };
        let mut trace: Vec<ExecutionStep> = Vec::new();
        let mut final_response = String::new();

        let budget = max_steps.unwrap_or(self.config.max_steps);
        let mut remaining = budget;
        let mut steps = 0usize;
        let mut current: Option<&str> = Some(trigger.id.as_str());

        while let Some(node_id) = current {
            if remaining == 0 {
                break;
            }
            if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(EngineError::Cancelled { steps });
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(EngineError::DeadlineExceeded { steps });
            }
            remaining -= 1;

            let Some(node) = index.node(node_id) else {
                warn!("edge points at unknown node '{node_id}', ending run");
                current = None;
                break;
            };
            let Some(handler) = self.registry.get(&node.block_id) else {
                warn!(
                    "no handler registered for block '{}' (node '{}'), ending run",
                    node.block_id, node.id
                );
                current = None;
                break;
            };

            let started_at = Utc::now();
            let clock = std::time::Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancelled(cancel.as_ref()) => return Err(EngineError::Cancelled { steps }),
                _ = deadline_reached(deadline) => {
                    return Err(EngineError::DeadlineExceeded { steps })
                }
                outcome = self.invoke(handler.as_ref(), &ctx, &node.config) => outcome,
            };
            let duration = clock.elapsed();
            steps += 1;

            let (result, error) = match outcome {
                Ok(result) => (result, None),
                Err(failure) if self.config.recover_handler_failures => {
                    let reason = failure.describe();
                    warn!(
                        "handler '{}' failed on node '{}', using fallback: {reason}",
                        node.block_id, node.id
                    );
                    (HandlerResult::empty().routed(OUTPUT_ERROR), Some(reason))
                }
                Err(failure) => return Err(failure.into_engine_error(node)),
            };

            debug!(
                node_id = %node.id,
                block_id = %node.block_id,
                output = ?result.output,
                elapsed_ms = duration.as_millis() as u64,
                "step completed"
            );

            if trace_execution {
                trace.push(ExecutionStep {
                    node_id: node.id.clone(),
                    block_id: node.block_id.clone(),
                    block_name: node.block_name.clone(),
                    result: result.clone(),
                    duration_ms: duration.as_millis() as u64,
                    output: result.output.clone(),
                    started_at,
                    error,
                });
            }

            let HandlerResult { data, output } = result;
            if let Some(data) = data {
                absorb(&mut ctx, &mut final_response, data);
            }

            current = index
                .next_edge(node_id, output.as_deref())
                .map(|edge| edge.target_node_id.as_str());
        }

        let truncated = current.is_some();
        if truncated {
            warn!("step budget of {budget} exhausted, possible cycle; returning partial result");
        }

        info!(steps, truncated, "flow run finished");

        Ok(FlowExecutionResult {
            execution_id,
            final_response,
            sources: ctx.sources,
            trace,
            variables: ctx.variables,
            steps_executed: steps,
            truncated,
        })
    }

    /// Call the handler inside the recovery boundary.
    async fn invoke(
        &self,
        handler: &dyn BlockHandler,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, Failure> {
        let call = AssertUnwindSafe(handler.handle(ctx, config)).catch_unwind();
        let joined = match self.config.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(joined) => joined,
                Err(_) => return Err(Failure::TimedOut(limit)),
            },
            None => call.await,
        };

        match joined {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(Failure::Error(err)),
            Err(payload) => Err(Failure::Panic(panic_message(payload))),
        }
    }
}

/// Merge one handler result into the run state.
fn absorb(ctx: &mut FlowContext, final_response: &mut String, data: HandlerData) {
    if let Some(message) = data.message {
        ctx.variables.insert(LAST_RESPONSE.to_owned(), json!(message));
        *final_response = message;
    }
    if let Some(sources) = data.sources {
        ctx.sources.extend(sources);
    }
    if let Some(variables) = data.variables {
        ctx.variables.extend(variables);
    }
}
