//! External services the bundled handlers delegate to.
//!
//! Every collaborator is optional. A handler whose collaborator is missing,
//! or returns an error, falls back to a safe default instead of failing the
//! run. Implementations must be safe to call from concurrent runs.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{ChatMessage, Source};

/// Input for a full agent turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub agent_id: Option<String>,
    pub conversation_id: Option<String>,
    pub message: String,
    pub system_prompt: Option<String>,
    pub history: Vec<ChatMessage>,
    /// Sources collected earlier in the run, offered as grounding.
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentReply {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: String,
    pub top_k: usize,
    pub score_threshold: f64,
}

/// Runs a complete agent turn (retrieval, prompting, generation).
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn execute_agent(&self, request: AgentRequest) -> anyhow::Result<AgentReply>;
}

/// Raw chat completion.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion>;
}

/// Knowledge base lookup.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(&self, query: SearchQuery) -> anyhow::Result<Vec<Source>>;
}

/// The set of collaborators handed to the bundled handlers.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub orchestrator: Option<Arc<dyn Orchestrator>>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub knowledge: Option<Arc<dyn KnowledgeSearch>>,
}

impl Collaborators {
    /// No collaborators at all; every bundled handler uses its fallback.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_orchestrator(mut self, orchestrator: Arc<dyn Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeSearch>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("orchestrator", &self.orchestrator.is_some())
            .field("llm", &self.llm.is_some())
            .field("knowledge", &self.knowledge.is_some())
            .finish()
    }
}
