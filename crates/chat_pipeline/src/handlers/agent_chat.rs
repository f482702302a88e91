//! Agent chat handler.
//!
//! Delegates to the agent execution backend with enriched messages and
//! capability flags, then converts the run's event stream into processed
//! text through the matching capability handler.

use std::sync::Arc;
use std::time::Instant;

use agent_client::RunCapabilities;
use async_trait::async_trait;

use crate::capability::{CapabilityHandler, StreamSetup};
use crate::context::{ChatContext, ChatResponse, ExecutionStrategy};
use crate::error::PipelineError;
use crate::services::ServiceContainer;
use crate::stage::Stage;
use crate::streaming::metadata::{ResponseMetadata, TranscriptInfo};

pub struct AgentChatHandler {
    services: Arc<ServiceContainer>,
}

impl AgentChatHandler {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }
}

pub(super) fn base_metadata(ctx: &ChatContext) -> ResponseMetadata {
    ResponseMetadata {
        citations: Vec::new(),
        thread_id: None,
        transcripts: ctx
            .processed_content
            .transcripts
            .iter()
            .map(|t| TranscriptInfo {
                file_name: t.file_name.clone(),
                pending: t.placeholder,
            })
            .collect(),
        pending_transcriptions: ctx.processed_content.pending_transcriptions.clone(),
        code_interpreter: None,
    }
}

/// Resolve the thread, append the user turn, start the run, and wrap the
/// event stream. Shared by the agent and code-interpreter handlers.
pub(super) async fn dispatch_run(
    services: &ServiceContainer,
    mut ctx: ChatContext,
    agent_id: String,
    capabilities: RunCapabilities,
) -> Result<ChatContext, PipelineError> {
    let start = Instant::now();

    let (thread_id, created) = match &ctx.request.thread_id {
        Some(existing) => (existing.clone(), None),
        None => {
            let id = services.agents.create_thread().await?;
            (id.clone(), Some(id))
        }
    };

    services
        .agents
        .append_message(&thread_id, "user", &ctx.last_user_text())
        .await?;

    let events = services
        .agents
        .stream_run(&agent_id, &thread_id, &capabilities, ctx.request.temperature)
        .await
        .map_err(|e| {
            log::error!(
                "agent run failed to start after {}ms (thread {thread_id}): {e}",
                start.elapsed().as_millis()
            );
            e
        })?;

    let handler = CapabilityHandler::select(&ctx.agent_capabilities);
    let setup = StreamSetup {
        existing_citations: ctx.citations(),
        created_thread_id: created,
        base_metadata: base_metadata(&ctx),
        cancel: ctx.cancel.clone(),
    };

    log::info!(
        "agent run started on thread {thread_id} with {handler:?} in {}ms",
        start.elapsed().as_millis()
    );
    ctx.response = Some(ChatResponse::Stream(handler.create_stream(events, setup)));
    Ok(ctx)
}

#[async_trait]
impl Stage for AgentChatHandler {
    fn name(&self) -> &str {
        "agent_chat"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        ctx.execution_strategy == ExecutionStrategy::Agent
    }

    async fn execute(&self, ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        let agent_id = ctx
            .request
            .model
            .agent_id
            .clone()
            .ok_or_else(|| PipelineError::Config("model has no agent identifier".into()))?;

        let capabilities = RunCapabilities {
            bing_grounding: ctx.agent_capabilities.bing_grounding,
            code_interpreter: ctx.agent_capabilities.code_interpreter,
            file_ids: ctx.agent_capabilities.uploaded_file_ids.clone(),
        };

        dispatch_run(&self.services, ctx, agent_id, capabilities).await
    }
}
