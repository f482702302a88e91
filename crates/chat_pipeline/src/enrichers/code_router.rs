//! Code-interpreter router.
//!
//! In "intelligent" code-execution mode, classifies the user's intent
//! into a boolean recommendation consumed later by the agent enricher.
//! Classification failure defaults to "not needed": the cheaper path.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::{ChatContext, CodeInterpreterMode, META_CODE_RECOMMENDED};
use crate::error::PipelineError;
use crate::services::ServiceContainer;
use crate::stage::Stage;

const ROUTER_SYSTEM: &str = "Decide whether the user's request needs code execution \
(data analysis, file transformation, chart or spreadsheet generation, computation). \
Generation requests like \"build me a spreadsheet\" warrant code execution even with no \
files attached. Respond with JSON: {\"use_code_interpreter\": true|false, \"reasoning\": \"...\"}.";

pub struct CodeInterpreterRouterEnricher {
    services: Arc<ServiceContainer>,
}

impl CodeInterpreterRouterEnricher {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Stage for CodeInterpreterRouterEnricher {
    fn name(&self) -> &str {
        "code_interpreter_router"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        ctx.request.code_interpreter_mode == CodeInterpreterMode::Intelligent
            && ctx.request.agent_mode
            && ctx.request.model.supports_agent_mode()
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        let file_names: Vec<String> = ctx
            .processed_content
            .files
            .iter()
            .map(|f| f.name.clone())
            .collect();
        let user = format!(
            "Request: {}\nAttached files: {}",
            ctx.last_user_text(),
            if file_names.is_empty() {
                "none".to_string()
            } else {
                file_names.join(", ")
            }
        );

        let recommended = match self.services.aux.structured(ROUTER_SYSTEM, &user).await {
            Ok(value) => {
                let decision = value["use_code_interpreter"].as_bool().unwrap_or(false);
                log::debug!(
                    "code routing: {decision} ({})",
                    value["reasoning"].as_str().unwrap_or("")
                );
                decision
            }
            Err(e) => {
                ctx.record_failure(self.name(), format!("router call failed: {e}"));
                false
            }
        };

        ctx.processed_content
            .metadata
            .insert(META_CODE_RECOMMENDED.to_string(), Value::Bool(recommended));
        Ok(ctx)
    }
}
