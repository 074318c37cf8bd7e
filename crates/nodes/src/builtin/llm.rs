//! Blocks that call the raw LLM: intent classification and data extraction.
//!
//! Both ask for a bare JSON object and tolerate replies wrapped in a
//! markdown fence or surrounded by prose. Any failure degrades to the
//! documented default instead of failing the run.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::config_list;
use crate::collaborators::{CompletionRequest, LlmClient};
use crate::context::{ChatMessage, FlowContext, Variables};
use crate::traits::HandlerData;
use crate::{BlockHandler, HandlerError, HandlerResult};

pub const FALLBACK_INTENT: &str = "other";
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

const DEFAULT_INTENTS: [&str; 5] = ["question", "purchase", "complaint", "support", "other"];

const CLASSIFY_TEMPERATURE: f32 = 0.1;
const CLASSIFY_MAX_TOKENS: u32 = 100;
const EXTRACT_TEMPERATURE: f32 = 0.0;
const EXTRACT_MAX_TOKENS: u32 = 500;

/// Pull the JSON object out of an LLM reply.
fn parse_json_object(reply: &str) -> Option<Map<String, Value>> {
    let trimmed = strip_code_fence(reply.trim());
    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    match serde_json::from_str(trimmed.get(start..=end)?) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line, then everything from the closing fence.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.rsplit_once("```").map_or(body, |(inner, _)| inner).trim()
}

async fn ask(
    llm: &dyn LlmClient,
    system: String,
    user: &str,
    temperature: f32,
    max_tokens: u32,
) -> anyhow::Result<String> {
    let completion = llm
        .complete(CompletionRequest {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
            max_tokens,
        })
        .await?;
    Ok(completion.content)
}

// ---------------------------------------------------------------------------
// ai_classify_intent
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Classification {
    intent: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Classifies the user message into one of `config.intents`.
///
/// Routes on the intent label itself, so a flow can branch with edges whose
/// handles are intent names.
pub struct ClassifyIntent {
    llm: Option<Arc<dyn LlmClient>>,
}

impl ClassifyIntent {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    async fn classify(&self, message: &str, intents: &[String]) -> anyhow::Result<(String, f64)> {
        let llm = self
            .llm
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no LLM configured"))?;

        let system = format!(
            "Classify the user's message into exactly one of these intents: {}.\n\
             Respond ONLY with a JSON object: {{\"intent\": \"<intent>\", \"confidence\": <0..1>}}",
            intents.join(", ")
        );
        let reply = ask(llm, system, message, CLASSIFY_TEMPERATURE, CLASSIFY_MAX_TOKENS).await?;

        let map = parse_json_object(&reply)
            .ok_or_else(|| anyhow::anyhow!("unparseable classification: {reply}"))?;
        let parsed: Classification = serde_json::from_value(Value::Object(map))?;

        // Route on the configured spelling so it matches the edge handles.
        let answered = parsed.intent.trim();
        let Some(intent) = intents
            .iter()
            .find(|known| known.eq_ignore_ascii_case(answered))
            .cloned()
        else {
            anyhow::bail!("intent '{answered}' is not one of the configured intents");
        };
        let confidence = parsed
            .confidence
            .unwrap_or(FALLBACK_CONFIDENCE)
            .clamp(0.0, 1.0);
        Ok((intent, confidence))
    }
}

#[async_trait]
impl BlockHandler for ClassifyIntent {
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let mut intents = config_list(config, "intents");
        if intents.is_empty() {
            intents = DEFAULT_INTENTS.iter().map(|s| s.to_string()).collect();
        }

        let (intent, confidence) = match self.classify(&ctx.message, &intents).await {
            Ok(found) => found,
            Err(err) => {
                warn!("intent classification failed, defaulting to '{FALLBACK_INTENT}': {err:#}");
                (FALLBACK_INTENT.to_string(), FALLBACK_CONFIDENCE)
            }
        };
        debug!(%intent, confidence, "classified intent");

        let mut variables = Variables::new();
        variables.insert("intent".into(), json!(intent));
        variables.insert("confidence".into(), json!(confidence));

        Ok(HandlerResult::with_data(HandlerData {
            variables: Some(variables),
            intent: Some(intent.clone()),
            confidence: Some(confidence),
            ..HandlerData::default()
        })
        .routed(intent))
    }
}

// ---------------------------------------------------------------------------
// ai_extract_data
// ---------------------------------------------------------------------------

/// Extracts `config.fields` from the user message as a JSON object.
///
/// Fields the model could not find are left out. The result lands in both
/// `extractedData` and `variables.extractedData`.
pub struct ExtractData {
    llm: Option<Arc<dyn LlmClient>>,
}

impl ExtractData {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    async fn extract(
        &self,
        message: &str,
        fields: &[String],
    ) -> anyhow::Result<Map<String, Value>> {
        let llm = self
            .llm
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no LLM configured"))?;

        let wanted = if fields.is_empty() {
            "any structured data (names, emails, phone numbers, order numbers, dates)".to_string()
        } else {
            fields.join(", ")
        };
        let system = format!(
            "Extract the following fields from the user's message: {wanted}.\n\
             Respond ONLY with a JSON object. Omit fields that are not present."
        );
        let reply = ask(llm, system, message, EXTRACT_TEMPERATURE, EXTRACT_MAX_TOKENS).await?;

        let mut map = parse_json_object(&reply)
            .ok_or_else(|| anyhow::anyhow!("unparseable extraction: {reply}"))?;
        if !fields.is_empty() {
            map.retain(|key, value| fields.contains(key) && !value.is_null());
        }
        Ok(map)
    }
}

#[async_trait]
impl BlockHandler for ExtractData {
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let fields = config_list(config, "fields");
        let extracted = match self.extract(&ctx.message, &fields).await {
            Ok(map) => Value::Object(map),
            Err(err) => {
                warn!("data extraction failed, returning empty object: {err:#}");
                Value::Object(Map::new())
            }
        };

        let mut variables = Variables::new();
        variables.insert("extractedData".into(), extracted.clone());

        Ok(HandlerResult::with_data(HandlerData {
            variables: Some(variables),
            extracted_data: Some(extracted),
            ..HandlerData::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Completion;
    use std::sync::Mutex;

    struct Scripted {
        reply: anyhow::Result<String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(anyhow::anyhow!("rate limited")),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for Scripted {
        async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Ok(content) => Ok(Completion { content: content.clone() }),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    #[test]
    fn json_is_found_in_fenced_and_chatty_replies() {
        let fenced = "```json\n{\"intent\": \"purchase\"}\n```";
        assert_eq!(parse_json_object(fenced).unwrap()["intent"], json!("purchase"));

        let chatty = "Sure! Here it is: {\"email\": \"a@b.c\"} hope that helps";
        assert_eq!(parse_json_object(chatty).unwrap()["email"], json!("a@b.c"));

        assert!(parse_json_object("no json here").is_none());
        assert!(parse_json_object("[1, 2]").is_none());
    }

    #[tokio::test]
    async fn classification_routes_on_intent() {
        let llm = Scripted::ok(r#"{"intent": "Complaint", "confidence": 0.91}"#);
        let handler = ClassifyIntent::new(Some(llm.clone() as Arc<dyn LlmClient>));

        let result = handler
            .handle(&FlowContext::new("this is broken"), &json!({}))
            .await
            .unwrap();

        assert_eq!(result.output.as_deref(), Some("complaint"));
        let data = result.data.unwrap();
        assert_eq!(data.intent.as_deref(), Some("complaint"));
        assert_eq!(data.confidence, Some(0.91));
        assert_eq!(data.variables.unwrap()["confidence"], json!(0.91));

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0].messages[1].content, "this is broken");
        assert_eq!(seen[0].max_tokens, CLASSIFY_MAX_TOKENS);
    }

    #[tokio::test]
    async fn classification_failures_default_to_other() {
        let unknown = Scripted::ok(r#"{"intent": "weather", "confidence": 0.99}"#);
        for llm in [Some(Scripted::failing()), Some(unknown), None] {
            let handler = ClassifyIntent::new(llm.map(|l| l as Arc<dyn LlmClient>));
            let result = handler
                .handle(&FlowContext::new("hm"), &json!({ "intents": ["question", "other"] }))
                .await
                .unwrap();
            assert_eq!(result.output.as_deref(), Some(FALLBACK_INTENT));
            assert_eq!(result.data.unwrap().confidence, Some(FALLBACK_CONFIDENCE));
        }
    }

    #[tokio::test]
    async fn extraction_keeps_only_requested_fields() {
        let llm = Scripted::ok(r#"{"email": "jo@shop.fr", "order": null, "mood": "happy"}"#);
        let handler = ExtractData::new(Some(llm as Arc<dyn LlmClient>));

        let result = handler
            .handle(
                &FlowContext::new("jo@shop.fr, no order yet"),
                &json!({ "fields": ["email", "order"] }),
            )
            .await
            .unwrap();

        let data = result.data.unwrap();
        assert_eq!(data.extracted_data, Some(json!({ "email": "jo@shop.fr" })));
        assert_eq!(data.variables.unwrap()["extractedData"], json!({ "email": "jo@shop.fr" }));
    }

    #[tokio::test]
    async fn extraction_failure_is_empty_object() {
        let handler = ExtractData::new(Some(Scripted::failing() as Arc<dyn LlmClient>));
        let result = handler
            .handle(&FlowContext::new("x"), &json!({ "fields": "email" }))
            .await
            .unwrap();
        assert_eq!(result.data.unwrap().extracted_data, Some(json!({})));
    }
}
