//! Trigger blocks: the entry points of a flow.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::config_str;
use crate::context::{FlowContext, Variables};
use crate::traits::HandlerData;
use crate::{BlockHandler, HandlerError, HandlerResult};

pub const DEFAULT_GREETING: &str = "Bonjour ! Comment puis-je vous aider aujourd'hui ?";

/// Fires on every inbound message. Exposes it as `variables.userMessage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageReceived;

#[async_trait]
impl BlockHandler for MessageReceived {
    async fn handle(
        &self,
        ctx: &FlowContext,
        _config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let mut variables = Variables::new();
        variables.insert("userMessage".into(), json!(ctx.message));
        Ok(HandlerResult::with_data(HandlerData {
            variables: Some(variables),
            ..HandlerData::default()
        }))
    }
}

/// Fires when a conversation opens and greets the visitor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewConversation;

#[async_trait]
impl BlockHandler for NewConversation {
    async fn handle(
        &self,
        _ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let greeting = config_str(config, "greeting")
            .filter(|g| !g.trim().is_empty())
            .unwrap_or(DEFAULT_GREETING);
        Ok(HandlerResult::message(greeting))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_received_records_user_message() {
        let ctx = FlowContext::new("where is my order?");
        let result = MessageReceived.handle(&ctx, &Value::Null).await.unwrap();
        let vars = result.data.unwrap().variables.unwrap();
        assert_eq!(vars["userMessage"], json!("where is my order?"));
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn greeting_comes_from_config_with_default() {
        let ctx = FlowContext::new("");
        let custom = NewConversation
            .handle(&ctx, &json!({ "greeting": "Welcome!" }))
            .await
            .unwrap();
        assert_eq!(custom.message_text(), Some("Welcome!"));

        let fallback = NewConversation.handle(&ctx, &json!({})).await.unwrap();
        assert_eq!(fallback.message_text(), Some(DEFAULT_GREETING));
    }
}
