//! Tool-router enricher.
//!
//! Decides whether a web-search tool call is warranted for this turn and,
//! when it is, merges its citations with any the RAG enricher already
//! produced. Citation numbers stay globally sequential: RAG citations
//! keep their numbers, web citations continue from there, and the
//! injected reference text uses only the continued numbering.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{ChatContext, Citation, ProcessedFileKind, SearchMode};
use crate::error::PipelineError;
use crate::services::ServiceContainer;
use crate::stage::Stage;

const CLASSIFIER_SYSTEM: &str = "Decide whether answering the user's request needs a live web \
search for current, external information the assistant would not reliably know. Respond with \
JSON: {\"use_search\": true|false, \"reasoning\": \"...\"}.";

const WEB_TOP_K: usize = 5;

pub struct ToolRouterEnricher {
    services: Arc<ServiceContainer>,
}

impl ToolRouterEnricher {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }

    /// Current message plus any file/transcript context already
    /// extracted, compressed into one classifier input.
    fn combined_summary(ctx: &ChatContext) -> String {
        let mut summary = ctx.last_user_text();
        for transcript in &ctx.processed_content.transcripts {
            summary.push_str("\nTranscript: ");
            let snippet: String = transcript.text.chars().take(400).collect();
            summary.push_str(&snippet);
        }
        for file in &ctx.processed_content.files {
            match &file.kind {
                ProcessedFileKind::Inline { text } | ProcessedFileKind::Summary { text } => {
                    summary.push_str(&format!("\nFile {}: ", file.name));
                    let snippet: String = text.chars().take(400).collect();
                    summary.push_str(&snippet);
                }
                _ => {}
            }
        }
        summary
    }
}

#[async_trait]
impl Stage for ToolRouterEnricher {
    fn name(&self) -> &str {
        "tool_router"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        matches!(ctx.search_mode, SearchMode::Intelligent | SearchMode::Always)
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        // Forced mode skips the classifier entirely.
        let warranted = if ctx.search_mode == SearchMode::Always {
            true
        } else {
            let summary = Self::combined_summary(&ctx);
            match self
                .services
                .aux
                .structured(CLASSIFIER_SYSTEM, &summary)
                .await
            {
                Ok(value) => value["use_search"].as_bool().unwrap_or(false),
                Err(e) => {
                    ctx.record_failure(self.name(), format!("classifier failed: {e}"));
                    false
                }
            }
        };

        if !warranted {
            return Ok(ctx);
        }

        let query = ctx.last_user_text();
        let results = match self.services.web_search.search(&query, WEB_TOP_K).await {
            Ok(results) => results,
            Err(e) => {
                ctx.record_failure(self.name(), format!("web search failed: {e}"));
                return Ok(ctx);
            }
        };
        if results.is_empty() {
            return Ok(ctx);
        }

        // Continue numbering after whatever RAG recorded.
        let mut citations = ctx.citations();
        let offset = citations.len();

        let mut block = String::from("Web search results:\n");
        for (i, result) in results.iter().enumerate() {
            let number = offset + i + 1;
            block.push_str(&format!(
                "[{number}] {} ({})\n{}\n\n",
                result.title,
                result.date.as_deref().unwrap_or("undated"),
                result.snippet
            ));
            citations.push(Citation {
                number,
                title: result.title.clone(),
                url: result.url.clone(),
                date: result.date.clone(),
            });
        }

        ctx.set_citations(&citations);
        ctx.push_system_message(block);
        log::info!(
            "tool router added {} web citations (numbered from {})",
            citations.len() - offset,
            offset + 1
        );
        Ok(ctx)
    }
}
