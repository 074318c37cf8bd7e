//! `MockHandler` — a test double for `BlockHandler`.
//!
//! Useful in unit and integration tests where a bundled handler is either
//! unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{traits::HandlerResult, BlockHandler, FlowContext, HandlerError};

/// Behaviour injected into `MockHandler` at construction time.
pub enum MockBehaviour {
    /// Return a clone of this result.
    Return(HandlerResult),
    /// Reply with `"<prefix><ctx.message>"` as the message.
    EchoMessage(String),
    /// Fail with `HandlerError::Collaborator`.
    Fail(String),
    /// Panic with the given message.
    Panic(String),
}

/// One recorded invocation: the context as the handler saw it, and its node config.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub context: FlowContext,
    pub config: Value,
}

/// A mock handler that records every call it receives and returns a
/// programmer-specified result, optionally after a delay.
pub struct MockHandler {
    pub behaviour: MockBehaviour,
    pub delay: Option<Duration>,
    /// All invocations seen by this handler (in call order).
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockHandler {
    fn with(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with the given result.
    pub fn returning(result: HandlerResult) -> Self {
        Self::with(MockBehaviour::Return(result))
    }

    /// Create a mock that replies with `prefix` followed by the user message.
    pub fn echoing(prefix: impl Into<String>) -> Self {
        Self::with(MockBehaviour::EchoMessage(prefix.into()))
    }

    /// Create a mock that always fails.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Fail(msg.into()))
    }

    /// Create a mock that always panics.
    pub fn panicking(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Panic(msg.into()))
    }

    /// Sleep for `delay` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times this handler has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of the recorded invocations.
    pub fn recorded_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockHandler for MockHandler {
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        self.calls.lock().unwrap().push(MockCall {
            context: ctx.clone(),
            config: config.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behaviour {
            MockBehaviour::Return(result) => Ok(result.clone()),
            MockBehaviour::EchoMessage(prefix) => {
                Ok(HandlerResult::message(format!("{prefix}{}", ctx.message)))
            }
            MockBehaviour::Fail(msg) => Err(HandlerError::Collaborator(msg.clone())),
            MockBehaviour::Panic(msg) => panic!("{msg}"),
        }
    }
}
