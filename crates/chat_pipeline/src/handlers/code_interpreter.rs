//! Code-interpreter chat handler.
//!
//! A simpler, non-agent invocation style distinct from "agent mode with
//! the code capability": the dedicated code-execution agent identifier
//! takes priority over the general one, and the run always carries the
//! code-interpreter capability.

use std::sync::Arc;

use agent_client::RunCapabilities;
use async_trait::async_trait;

use crate::context::{ChatContext, ExecutionStrategy};
use crate::error::PipelineError;
use crate::services::ServiceContainer;
use crate::stage::Stage;

use super::agent_chat::dispatch_run;

pub struct CodeInterpreterChatHandler {
    services: Arc<ServiceContainer>,
}

impl CodeInterpreterChatHandler {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Stage for CodeInterpreterChatHandler {
    fn name(&self) -> &str {
        "code_interpreter_chat"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        ctx.execution_strategy == ExecutionStrategy::CodeInterpreter
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        let agent_id = ctx
            .request
            .model
            .code_agent_id
            .clone()
            .or_else(|| ctx.request.model.agent_id.clone())
            .ok_or_else(|| {
                PipelineError::Config("model has no code execution agent identifier".into())
            })?;

        // Upload whatever compatible raw content processing kept around.
        let candidates: Vec<(String, bytes::Bytes)> = ctx
            .processed_content
            .files
            .iter()
            .filter_map(|f| f.raw.clone().map(|raw| (f.name.clone(), raw)))
            .collect();
        let mut file_ids = ctx.agent_capabilities.uploaded_file_ids.clone();
        for (name, raw) in candidates {
            match self
                .services
                .agents
                .upload_file(&name, raw, "assistants")
                .await
            {
                Ok(file_id) => file_ids.push(file_id),
                Err(e) => {
                    ctx.record_failure(self.name(), format!("upload {name} failed: {e}"));
                }
            }
        }

        ctx.agent_capabilities.code_interpreter = true;
        ctx.agent_capabilities.uploaded_file_ids = file_ids.clone();

        let capabilities = RunCapabilities {
            bing_grounding: false,
            code_interpreter: true,
            file_ids,
        };

        dispatch_run(&self.services, ctx, agent_id, capabilities).await
    }
}
