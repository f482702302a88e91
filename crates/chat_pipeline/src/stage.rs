//! Stage contract and pipeline runner.
//!
//! Stages execute in registration order; a stage whose guard is false is
//! skipped entirely. Guards are pure predicates. Expected failures stay
//! inside a stage (recorded on the context); an `Err` from `execute`
//! aborts the pipeline and surfaces as a top-level error response.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::ChatContext;
use crate::enrichers::{
    AgentEnricher, CodeInterpreterRouterEnricher, RagEnricher, ToolRouterEnricher,
};
use crate::error::PipelineError;
use crate::handlers::{AgentChatHandler, CodeInterpreterChatHandler, StandardChatHandler};
use crate::processors::{ActiveFileInjector, FileProcessor, ImageProcessor};
use crate::services::ServiceContainer;

#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name for logging and failure attribution.
    fn name(&self) -> &str;

    /// Pure guard: no side effects, no I/O.
    fn should_run(&self, ctx: &ChatContext) -> bool;

    /// Consume the context and return the next one.
    async fn execute(&self, ctx: ChatContext) -> Result<ChatContext, PipelineError>;
}

/// Ordered stage runner.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Register a stage (chainable). Stages run in registration order.
    pub fn register(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub async fn run(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        for stage in &self.stages {
            if !stage.should_run(&ctx) {
                log::debug!("skipping stage: {}", stage.name());
                continue;
            }

            let start = Instant::now();
            log::debug!("running stage: {}", stage.name());
            ctx = stage.execute(ctx).await.map_err(|e| {
                log::error!("stage {} failed: {e}", stage.name());
                e
            })?;
            log::debug!(
                "stage {} finished in {}ms",
                stage.name(),
                start.elapsed().as_millis()
            );
        }
        Ok(ctx)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// The production stage order: processors, then enrichers in their fixed
/// priority order, then the mutually exclusive execution handlers.
pub fn default_pipeline(services: Arc<ServiceContainer>) -> Pipeline {
    Pipeline::new()
        .register(Box::new(FileProcessor::new(services.clone())))
        .register(Box::new(ImageProcessor::new(services.clone())))
        .register(Box::new(ActiveFileInjector::new(services.clone())))
        .register(Box::new(CodeInterpreterRouterEnricher::new(services.clone())))
        .register(Box::new(RagEnricher::new(services.clone())))
        .register(Box::new(ToolRouterEnricher::new(services.clone())))
        .register(Box::new(AgentEnricher::new(services.clone())))
        .register(Box::new(AgentChatHandler::new(services.clone())))
        .register(Box::new(CodeInterpreterChatHandler::new(services.clone())))
        .register(Box::new(StandardChatHandler::new(services)))
}
