//! Action blocks that talk back to the visitor.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::config_str;
use crate::context::{FlowContext, Variables};
use crate::traits::HandlerData;
use crate::{BlockHandler, HandlerError, HandlerResult};

pub const RESPONSE_PLACEHOLDER: &str = "{{response}}";
pub const OUTPUT_TRANSFERRED: &str = "transferred";
pub const DEFAULT_TRANSFER_MESSAGE: &str =
    "Je vous mets en relation avec un conseiller. Merci de patienter quelques instants.";

/// `action_send_message`: renders `config.messageTemplate`.
///
/// `{{response}}` is replaced with `variables.lastResponse` (empty when no
/// message was produced yet). The default template is the placeholder alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendMessage;

#[async_trait]
impl BlockHandler for SendMessage {
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let template = config_str(config, "messageTemplate").unwrap_or(RESPONSE_PLACEHOLDER);
        let rendered = template.replace(RESPONSE_PLACEHOLDER, ctx.last_response().unwrap_or(""));
        Ok(HandlerResult::message(rendered))
    }
}

/// `action_transfer_human`: announces the hand-off and flags the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransferToHuman;

#[async_trait]
impl BlockHandler for TransferToHuman {
    async fn handle(
        &self,
        _ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let message = config_str(config, "message")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_TRANSFER_MESSAGE);

        let mut variables = Variables::new();
        variables.insert("transferredToHuman".into(), json!(true));
        if let Some(reason) = config_str(config, "reason") {
            variables.insert("transferReason".into(), json!(reason));
        }

        Ok(HandlerResult::with_data(HandlerData {
            message: Some(message.to_owned()),
            variables: Some(variables),
            ..HandlerData::default()
        })
        .routed(OUTPUT_TRANSFERRED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LAST_RESPONSE;

    #[tokio::test]
    async fn template_substitutes_last_response() {
        let mut ctx = FlowContext::new("hello");
        ctx.variables.insert(LAST_RESPONSE.into(), json!("Hi there"));

        let result = SendMessage
            .handle(&ctx, &json!({ "messageTemplate": "You said: {{response}} ({{response}})" }))
            .await
            .unwrap();
        assert_eq!(result.message_text(), Some("You said: Hi there (Hi there)"));
    }

    #[tokio::test]
    async fn template_without_prior_response_renders_empty() {
        let result = SendMessage
            .handle(&FlowContext::new("hello"), &json!({ "messageTemplate": "[{{response}}]" }))
            .await
            .unwrap();
        assert_eq!(result.message_text(), Some("[]"));
    }

    #[tokio::test]
    async fn default_template_forwards_last_response() {
        let mut ctx = FlowContext::new("hello");
        ctx.variables.insert(LAST_RESPONSE.into(), json!("forward me"));
        let result = SendMessage.handle(&ctx, &Value::Null).await.unwrap();
        assert_eq!(result.message_text(), Some("forward me"));
    }

    #[tokio::test]
    async fn transfer_flags_run_and_routes() {
        let result = TransferToHuman
            .handle(&FlowContext::new("agent please"), &json!({ "reason": "angry" }))
            .await
            .unwrap();

        assert_eq!(result.output.as_deref(), Some(OUTPUT_TRANSFERRED));
        let data = result.data.unwrap();
        assert_eq!(data.message.as_deref(), Some(DEFAULT_TRANSFER_MESSAGE));
        let vars = data.variables.unwrap();
        assert_eq!(vars["transferredToHuman"], json!(true));
        assert_eq!(vars["transferReason"], json!("angry"));
    }
}
