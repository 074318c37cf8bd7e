//! The bundled block handlers.
//!
//! [`BuiltinBlock`] names every bundled block; [`default_handlers`] builds one
//! handler per block, wired to the given collaborators.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::collaborators::Collaborators;
use crate::BlockHandler;

pub mod actions;
pub mod conditions;
pub mod knowledge;
pub mod llm;
pub mod respond;
pub mod triggers;

pub use actions::{SendMessage, TransferToHuman};
pub use conditions::{ConditionIf, ConfidenceThreshold, Operator};
pub use knowledge::KnowledgeLookup;
pub use llm::{ClassifyIntent, ExtractData};
pub use respond::GenerateResponse;
pub use triggers::{MessageReceived, NewConversation};

/// Output label of a condition that held.
pub const OUTPUT_TRUE: &str = "true";
/// Output label of a condition that did not hold.
pub const OUTPUT_FALSE: &str = "false";

/// Every block shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinBlock {
    MessageReceived,
    NewConversation,
    KnowledgeSearch,
    GenerateResponse,
    SendMessage,
    TransferHuman,
    ConditionIf,
    ConditionConfidence,
    ClassifyIntent,
    ExtractData,
}

impl BuiltinBlock {
    pub const ALL: [BuiltinBlock; 10] = [
        BuiltinBlock::MessageReceived,
        BuiltinBlock::NewConversation,
        BuiltinBlock::KnowledgeSearch,
        BuiltinBlock::GenerateResponse,
        BuiltinBlock::SendMessage,
        BuiltinBlock::TransferHuman,
        BuiltinBlock::ConditionIf,
        BuiltinBlock::ConditionConfidence,
        BuiltinBlock::ClassifyIntent,
        BuiltinBlock::ExtractData,
    ];

    /// The block id used in flow definitions.
    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinBlock::MessageReceived => "message_received",
            BuiltinBlock::NewConversation => "new_conversation",
            BuiltinBlock::KnowledgeSearch => "knowledge_search",
            BuiltinBlock::GenerateResponse => "ai_generate_response",
            BuiltinBlock::SendMessage => "action_send_message",
            BuiltinBlock::TransferHuman => "action_transfer_human",
            BuiltinBlock::ConditionIf => "condition_if",
            BuiltinBlock::ConditionConfidence => "condition_confidence",
            BuiltinBlock::ClassifyIntent => "ai_classify_intent",
            BuiltinBlock::ExtractData => "ai_extract_data",
        }
    }

    /// Build the bundled handler for this block.
    pub fn handler(self, collaborators: &Collaborators) -> Arc<dyn BlockHandler> {
        match self {
            BuiltinBlock::MessageReceived => Arc::new(MessageReceived),
            BuiltinBlock::NewConversation => Arc::new(NewConversation),
            BuiltinBlock::KnowledgeSearch => {
                Arc::new(KnowledgeLookup::new(collaborators.knowledge.clone()))
            }
            BuiltinBlock::GenerateResponse => {
                Arc::new(GenerateResponse::new(collaborators.orchestrator.clone()))
            }
            BuiltinBlock::SendMessage => Arc::new(SendMessage),
            BuiltinBlock::TransferHuman => Arc::new(TransferToHuman),
            BuiltinBlock::ConditionIf => Arc::new(ConditionIf),
            BuiltinBlock::ConditionConfidence => Arc::new(ConfidenceThreshold),
            BuiltinBlock::ClassifyIntent => {
                Arc::new(ClassifyIntent::new(collaborators.llm.clone()))
            }
            BuiltinBlock::ExtractData => Arc::new(ExtractData::new(collaborators.llm.clone())),
        }
    }
}

impl fmt::Display for BuiltinBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuiltinBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinBlock::ALL
            .into_iter()
            .find(|block| block.as_str() == s)
            .ok_or_else(|| format!("unknown builtin block '{s}'"))
    }
}

/// One handler per bundled block, keyed by block id.
pub fn default_handlers(
    collaborators: &Collaborators,
) -> Vec<(BuiltinBlock, Arc<dyn BlockHandler>)> {
    BuiltinBlock::ALL
        .into_iter()
        .map(|block| (block, block.handler(collaborators)))
        .collect()
}

// ---------------------------------------------------------------------------
// Config accessors shared by the handlers. Missing or mistyped keys fall
// back to the caller's default.
// ---------------------------------------------------------------------------

pub(crate) fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

pub(crate) fn config_f64(config: &Value, key: &str, default: f64) -> f64 {
    match config.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

pub(crate) fn config_usize(config: &Value, key: &str, default: usize) -> usize {
    match config.get(key) {
        Some(Value::Number(n)) => n.as_u64().map_or(default, |n| n as usize),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// A list of strings, from either a JSON array or a comma-separated string.
pub(crate) fn config_list(config: &Value, key: &str) -> Vec<String> {
    match config.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_ids_round_trip_through_from_str() {
        for block in BuiltinBlock::ALL {
            assert_eq!(block.as_str().parse::<BuiltinBlock>(), Ok(block));
        }
        assert!("webhook".parse::<BuiltinBlock>().is_err());
    }

    #[test]
    fn default_handlers_cover_every_block() {
        let handlers = default_handlers(&Collaborators::none());
        assert_eq!(handlers.len(), BuiltinBlock::ALL.len());
    }

    #[test]
    fn config_list_accepts_arrays_and_csv() {
        let cfg = json!({ "a": ["x", " y ", ""], "b": "one, two,,three" });
        assert_eq!(config_list(&cfg, "a"), vec!["x", "y"]);
        assert_eq!(config_list(&cfg, "b"), vec!["one", "two", "three"]);
        assert!(config_list(&cfg, "missing").is_empty());
    }

    #[test]
    fn numeric_config_falls_back_on_bad_input() {
        let cfg = json!({ "k": "7", "t": "0.5", "bad": "x" });
        assert_eq!(config_usize(&cfg, "k", 5), 7);
        assert_eq!(config_f64(&cfg, "t", 0.7), 0.5);
        assert_eq!(config_f64(&cfg, "bad", 0.7), 0.7);
        assert_eq!(config_usize(&Value::Null, "k", 5), 5);
    }
}
