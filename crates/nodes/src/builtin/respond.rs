//! `ai_generate_response` — hand the turn to the agent orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::config_str;
use crate::collaborators::{AgentRequest, Orchestrator};
use crate::context::FlowContext;
use crate::traits::HandlerData;
use crate::{BlockHandler, HandlerError, HandlerResult};

pub const APOLOGY_MESSAGE: &str =
    "Désolé, je rencontre une difficulté technique. Pouvez-vous reformuler votre question ?";

/// Reply used when no orchestrator is wired, e.g. in the flow builder.
pub fn sandbox_reply(message: &str) -> String {
    format!("[Sandbox] Réponse simulée pour: \"{message}\"")
}

/// Generates the assistant reply through the [`Orchestrator`].
///
/// Sources gathered earlier in the run are passed along as grounding, and
/// the sources the orchestrator cites are returned for accumulation.
pub struct GenerateResponse {
    orchestrator: Option<Arc<dyn Orchestrator>>,
}

impl GenerateResponse {
    pub fn new(orchestrator: Option<Arc<dyn Orchestrator>>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl BlockHandler for GenerateResponse {
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let Some(orchestrator) = &self.orchestrator else {
            return Ok(HandlerResult::message(sandbox_reply(&ctx.message)));
        };

        let request = AgentRequest {
            agent_id: ctx.agent_id.clone(),
            conversation_id: ctx.conversation_id.clone(),
            message: ctx.message.clone(),
            system_prompt: config_str(config, "systemPrompt").map(str::to_owned),
            history: ctx.conversation_history.clone(),
            sources: ctx.sources.clone(),
        };

        match orchestrator.execute_agent(request).await {
            Ok(reply) => Ok(HandlerResult::with_data(HandlerData {
                message: Some(reply.response),
                sources: Some(reply.sources),
                ..HandlerData::default()
            })),
            Err(err) => {
                warn!("orchestrator failed, answering with apology: {err:#}");
                Ok(HandlerResult::message(APOLOGY_MESSAGE))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::AgentReply;
    use crate::context::{ChatMessage, Source};
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Option<AgentRequest>>,
    }

    #[async_trait]
    impl Orchestrator for Echo {
        async fn execute_agent(&self, request: AgentRequest) -> anyhow::Result<AgentReply> {
            let reply = AgentReply {
                response: format!("echo: {}", request.message),
                sources: vec![Source::new("FAQ", "answer")],
            };
            *self.seen.lock().unwrap() = Some(request);
            Ok(reply)
        }
    }

    struct Down;

    #[async_trait]
    impl Orchestrator for Down {
        async fn execute_agent(&self, _request: AgentRequest) -> anyhow::Result<AgentReply> {
            anyhow::bail!("503 from model provider")
        }
    }

    #[tokio::test]
    async fn without_orchestrator_replies_in_sandbox() {
        let result = GenerateResponse::new(None)
            .handle(&FlowContext::new("hello"), &Value::Null)
            .await
            .unwrap();
        assert_eq!(
            result.message_text(),
            Some("[Sandbox] Réponse simulée pour: \"hello\"")
        );
    }

    #[tokio::test]
    async fn orchestrator_reply_and_sources_are_returned() {
        let echo = Arc::new(Echo { seen: Mutex::new(None) });
        let handler = GenerateResponse::new(Some(echo.clone() as Arc<dyn Orchestrator>));
        let mut ctx = FlowContext::new("hi");
        ctx.agent_id = Some("agent-1".into());
        ctx.conversation_id = Some("conv-1".into());
        ctx.conversation_history = vec![ChatMessage::user("bonjour")];
        ctx.sources.push(Source::new("Earlier", "found before"));

        let result = handler
            .handle(&ctx, &json!({ "systemPrompt": "Be brief." }))
            .await
            .unwrap();

        let data = result.data.unwrap();
        assert_eq!(data.message.as_deref(), Some("echo: hi"));
        assert_eq!(data.sources.unwrap()[0].title, "FAQ");

        let seen = echo.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.agent_id.as_deref(), Some("agent-1"));
        assert_eq!(seen.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(seen.history, vec![ChatMessage::user("bonjour")]);
        assert_eq!(seen.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(seen.sources.len(), 1);
    }

    #[tokio::test]
    async fn orchestrator_failure_becomes_apology() {
        let result = GenerateResponse::new(Some(Arc::new(Down)))
            .handle(&FlowContext::new("hi"), &Value::Null)
            .await
            .unwrap();
        assert_eq!(result.message_text(), Some(APOLOGY_MESSAGE));
    }
}
