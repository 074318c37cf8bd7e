//! Per-run execution trace records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nodes::HandlerResult;

/// One executed step, recorded only when the caller asked for a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub node_id: String,
    pub block_id: String,
    pub block_name: String,
    /// What the handler returned (or the fallback that replaced it).
    pub result: HandlerResult,
    pub duration_ms: u64,
    /// Output label used for routing.
    pub output: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set when the handler failed and a fallback result was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
