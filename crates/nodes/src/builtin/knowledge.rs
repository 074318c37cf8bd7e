//! `knowledge_search` — query the knowledge base and collect sources.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{config_f64, config_str, config_usize};
use crate::collaborators::{KnowledgeSearch, SearchQuery};
use crate::context::{FlowContext, Variables};
use crate::traits::HandlerData;
use crate::{BlockHandler, HandlerError, HandlerResult};

pub const OUTPUT_RESULTS: &str = "results";
pub const OUTPUT_NO_RESULTS: &str = "no_results";

const DEFAULT_TOP_K: usize = 5;
const DEFAULT_SCORE_THRESHOLD: f64 = 0.7;

/// Searches with `config.query` (defaults to the user message).
///
/// Routes `results` when anything came back and `no_results` otherwise. A
/// failing or missing search backend yields no results.
pub struct KnowledgeLookup {
    search: Option<Arc<dyn KnowledgeSearch>>,
}

impl KnowledgeLookup {
    pub fn new(search: Option<Arc<dyn KnowledgeSearch>>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl BlockHandler for KnowledgeLookup {
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let query = SearchQuery {
            query: config_str(config, "query")
                .filter(|q| !q.trim().is_empty())
                .unwrap_or(ctx.message.as_str())
                .to_owned(),
            top_k: config_usize(config, "topK", DEFAULT_TOP_K),
            score_threshold: config_f64(config, "scoreThreshold", DEFAULT_SCORE_THRESHOLD),
        };

        let sources = match &self.search {
            Some(search) => match search.search(query).await {
                Ok(found) => found,
                Err(err) => {
                    warn!("knowledge search failed, continuing without sources: {err:#}");
                    Vec::new()
                }
            },
            None => {
                debug!("no knowledge backend configured");
                Vec::new()
            }
        };

        let output = if sources.is_empty() {
            OUTPUT_NO_RESULTS
        } else {
            OUTPUT_RESULTS
        };

        let mut variables = Variables::new();
        variables.insert("knowledgeResultCount".into(), json!(sources.len()));

        Ok(HandlerResult::with_data(HandlerData {
            sources: Some(sources),
            variables: Some(variables),
            ..HandlerData::default()
        })
        .routed(output))
    }
}
