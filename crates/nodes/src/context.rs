//! Per-run execution context shared with every handler of a flow run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Insertion-ordered variable map. Later writes overwrite earlier keys in place.
pub type Variables = IndexMap<String, Value>;

/// One turn of the conversation the flow runs inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user`, `assistant` or `system`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// A knowledge snippet collected while the flow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Source {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Mutable state of a single flow run.
///
/// Handlers only ever see it by shared reference; the interpreter merges
/// each handler result into it between steps. One instance per run, dropped
/// when the run returns.
#[derive(Debug, Clone, Default)]
pub struct FlowContext {
    /// The incoming user message. Never modified during the run.
    pub message: String,
    pub variables: Variables,
    /// Earlier turns supplied by the caller, forwarded to the orchestrator by
    /// `ai_generate_response`.
    pub conversation_history: Vec<ChatMessage>,
    /// Every source collected so far, in traversal order.
    pub sources: Vec<Source>,
    pub agent_id: Option<String>,
    pub conversation_id: Option<String>,
    /// Set when the run is a dry run from the flow builder.
    pub sandbox: bool,
}

impl FlowContext {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// The last message produced by a handler, as stored in `lastResponse`.
    pub fn last_response(&self) -> Option<&str> {
        self.variables.get(LAST_RESPONSE).and_then(Value::as_str)
    }
}

/// Variable the interpreter writes every produced message to.
pub const LAST_RESPONSE: &str = "lastResponse";
