//! The `BlockHandler` trait — the contract every block must fulfil.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{FlowContext, Source, Variables};
use crate::HandlerError;

/// Payload a handler hands back to the interpreter for merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerData {
    /// Becomes the run's final response and `variables.lastResponse`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Appended to the context sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Shallow-merged into the context variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Variables>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Value>,
}

/// What a handler returns for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HandlerData>,
    /// Label used to pick the outgoing edge. `None` follows the default edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl HandlerResult {
    /// A result with no data and no output label.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_data(data: HandlerData) -> Self {
        Self {
            data: Some(data),
            output: None,
        }
    }

    /// A result carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_data(HandlerData {
            message: Some(message.into()),
            ..HandlerData::default()
        })
    }

    pub fn routed(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// The message carried by this result, if any.
    pub fn message_text(&self) -> Option<&str> {
        self.data.as_ref()?.message.as_deref()
    }
}

/// The core handler trait.
///
/// One implementation per block id. Implementations must be stateless with
/// respect to a run: the same instance serves concurrent runs, and all run
/// state lives in the [`FlowContext`] they are given.
#[async_trait]
pub trait BlockHandler: Send + Sync {
    /// Handle one step for a node configured with `config`.
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError>;
}
