//! RAG enricher.
//!
//! When a knowledge-base identifier is present: look up the knowledge
//! base's configuration, reformulate the query, run the hybrid search,
//! and inject the numbered source block as a system message with a
//! parallel citation list in context metadata. Any failure degrades to
//! the unmodified context: search absence, not request failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::{ChatContext, META_KB_SYSTEM_PROMPT};
use crate::error::PipelineError;
use crate::rag::RagService;
use crate::services::ServiceContainer;
use crate::stage::Stage;

pub struct RagEnricher {
    services: Arc<ServiceContainer>,
}

impl RagEnricher {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Stage for RagEnricher {
    fn name(&self) -> &str {
        "rag_enricher"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        ctx.request.bot_id.is_some()
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        let bot_id = ctx.request.bot_id.clone().unwrap_or_default();
        let Some(kb) = self.services.knowledge_bases.lookup(&bot_id) else {
            ctx.record_failure(self.name(), format!("unknown knowledge base: {bot_id}"));
            return Ok(ctx);
        };
        let kb = kb.clone();

        let service = RagService::new(
            self.services.aux.clone(),
            self.services.search.clone(),
            self.services.config.reformulation_enabled,
        );

        let query = ctx.last_user_text();
        let recent = ctx.effective_messages().to_vec();
        let offset = ctx.citations().len();

        let outcome = match service.augment(&query, &recent, &kb, offset).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                log::debug!("rag search returned no usable results for {bot_id}");
                return Ok(ctx);
            }
            Err(e) => {
                // Degrade without leaking partial citation state.
                ctx.record_failure(self.name(), format!("search failed: {e}"));
                return Ok(ctx);
            }
        };

        if let Some(prompt) = outcome.system_prompt_override {
            ctx.processed_content
                .metadata
                .insert(META_KB_SYSTEM_PROMPT.to_string(), Value::String(prompt));
        }

        let mut citations = ctx.citations();
        citations.extend(outcome.citations);
        ctx.set_citations(&citations);
        ctx.push_system_message(outcome.source_block);

        log::info!(
            "rag enrichment added {} citations for {bot_id}",
            citations.len() - offset
        );
        Ok(ctx)
    }
}
