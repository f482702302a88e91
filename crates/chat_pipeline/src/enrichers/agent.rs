//! Agent enricher.
//!
//! Decides the final execution strategy for agent-mode requests. Code
//! execution is chosen by combining three policies (off /
//! always-with-compatible-files / intelligent per the router's
//! recommendation); otherwise web grounding is the default capability.
//! Multimodal input without code execution cannot use agent mode: the
//! documented fallback leaves the strategy Standard and upgrades search
//! mode instead, subject to the configured precedence policy.

use std::sync::Arc;

use async_trait::async_trait;
use chat_core::AgentFallbackPolicy;

use crate::context::{
    ChatContext, CodeInterpreterMode, ExecutionStrategy, ProcessedFile, SearchMode,
    META_CODE_RECOMMENDED,
};
use crate::error::PipelineError;
use crate::services::ServiceContainer;
use crate::stage::Stage;

/// File types the code-execution backend accepts.
const CODE_COMPATIBLE_EXTENSIONS: &[&str] =
    &["csv", "tsv", "xlsx", "json", "txt", "md", "pdf", "xml"];

fn is_code_compatible(file: &ProcessedFile) -> bool {
    file.raw.is_some()
        && CODE_COMPATIBLE_EXTENSIONS
            .contains(&crate::context::file_extension(&file.name).as_str())
}

pub struct AgentEnricher {
    services: Arc<ServiceContainer>,
}

impl AgentEnricher {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }

    fn wants_code_execution(&self, ctx: &ChatContext) -> bool {
        match ctx.request.code_interpreter_mode {
            CodeInterpreterMode::Off => false,
            CodeInterpreterMode::Always => ctx
                .processed_content
                .files
                .iter()
                .any(is_code_compatible),
            CodeInterpreterMode::Intelligent => ctx
                .processed_content
                .metadata_flag(META_CODE_RECOMMENDED),
        }
    }

    async fn upload_code_files(&self, ctx: &mut ChatContext) -> Vec<(String, String)> {
        let candidates: Vec<(String, bytes::Bytes)> = ctx
            .processed_content
            .files
            .iter()
            .filter(|f| is_code_compatible(f))
            .filter_map(|f| f.raw.clone().map(|raw| (f.name.clone(), raw)))
            .collect();

        let mut uploaded = Vec::new();
        for (name, raw) in candidates {
            match self
                .services
                .agents
                .upload_file(&name, raw, "assistants")
                .await
            {
                Ok(file_id) => uploaded.push((file_id, name)),
                Err(e) => {
                    ctx.record_failure("agent_enricher", format!("upload {name} failed: {e}"));
                }
            }
        }
        uploaded
    }
}

#[async_trait]
impl Stage for AgentEnricher {
    fn name(&self) -> &str {
        "agent_enricher"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        ctx.request.agent_mode && ctx.request.model.supports_agent_mode()
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        if self.wants_code_execution(&ctx) {
            let uploaded = self.upload_code_files(&mut ctx).await;
            if !uploaded.is_empty() {
                let names: Vec<&str> = uploaded.iter().map(|(_, name)| name.as_str()).collect();
                ctx.append_to_last_message(&format!(
                    "\n\n[Files attached for code execution: {}]",
                    names.join(", ")
                ));
            }
            ctx.agent_capabilities.code_interpreter = true;
            ctx.agent_capabilities.uploaded_file_ids =
                uploaded.into_iter().map(|(id, _)| id).collect();
            ctx.execution_strategy = ExecutionStrategy::Agent;
            return Ok(ctx);
        }

        if ctx.flags.has_files || ctx.flags.has_images {
            // Agent mode cannot carry multimodal input without code
            // execution. Fall back to the standard path, upgrading search
            // mode unless the client explicitly turned search off.
            let explicit_off = ctx.request.search_mode == SearchMode::Off;
            let respect_off = self.services.config.agent_fallback_policy
                == AgentFallbackPolicy::RespectExplicitOff;
            if !(explicit_off && respect_off) {
                ctx.search_mode = SearchMode::Intelligent;
            }
            log::info!(
                "agent mode not usable for multimodal input; falling back to standard \
                 (search mode now {:?})",
                ctx.search_mode
            );
            return Ok(ctx);
        }

        ctx.agent_capabilities.bing_grounding = true;
        ctx.execution_strategy = ExecutionStrategy::Agent;
        Ok(ctx)
    }
}
