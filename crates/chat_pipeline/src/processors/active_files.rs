//! Active-file injector.
//!
//! Active files are persistent context across turns, distinct from the
//! current upload. A budgeted subset is read back and rendered into a
//! textual block destined for the system prompt (not the message body).
//! Per-file reads are capped at a small fixed concurrency.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;

use crate::context::{
    is_image, ActiveFileRef, ChatContext, META_ACTIVE_FILE_BLOCK, META_UNSUPPORTED_IMAGES,
};
use crate::error::PipelineError;
use crate::services::ServiceContainer;
use crate::stage::Stage;

const MAX_IN_FLIGHT: usize = 3;

pub struct ActiveFileInjector {
    services: Arc<ServiceContainer>,
}

impl ActiveFileInjector {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }

    /// Greedy selection within the token budget, in client order.
    fn select<'a>(&self, files: &'a [ActiveFileRef]) -> Vec<&'a ActiveFileRef> {
        let budget = self.services.config.active_file_token_budget;
        let mut used = 0u32;
        let mut selected = Vec::new();
        for file in files {
            if used + file.token_estimate > budget {
                continue;
            }
            used += file.token_estimate;
            selected.push(file);
        }
        selected
    }

    async fn read_one(&self, user_id: &str, file: &ActiveFileRef) -> Option<(String, String)> {
        let path = blob_store::cached_text_path(user_id, &file.blob_id);
        match self.services.blob.get(&path).await {
            Ok(bytes) => Some((
                file.name.clone(),
                String::from_utf8_lossy(&bytes).into_owned(),
            )),
            Err(e) => {
                log::warn!("active file {} unavailable: {e}", file.name);
                None
            }
        }
    }
}

#[async_trait]
impl Stage for ActiveFileInjector {
    fn name(&self) -> &str {
        "active_file_injector"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        !ctx.request.active_files.is_empty()
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        let files = ctx.request.active_files.clone();
        let selected = self.select(&files);
        if selected.len() < files.len() {
            log::info!(
                "active files truncated to budget: {} of {} selected",
                selected.len(),
                files.len()
            );
        }

        if !ctx.request.model.supports_vision && files.iter().any(|f| is_image(&f.name)) {
            ctx.processed_content
                .metadata
                .insert(META_UNSUPPORTED_IMAGES.to_string(), Value::Bool(true));
            ctx.record_failure(
                self.name(),
                "active image files are not supported by the selected model",
            );
        }

        let user_id = ctx.user.id.clone();
        let mut queue = selected.into_iter();
        let mut in_flight = FuturesUnordered::new();
        for file in queue.by_ref().take(MAX_IN_FLIGHT) {
            in_flight.push(self.read_one(&user_id, file));
        }

        let mut sections: Vec<(String, String)> = Vec::new();
        while let Some(result) = in_flight.next().await {
            if let Some(section) = result {
                sections.push(section);
            }
            if let Some(file) = queue.next() {
                in_flight.push(self.read_one(&user_id, file));
            }
        }

        if sections.is_empty() {
            return Ok(ctx);
        }

        // Keep the block deterministic regardless of read completion order.
        sections.sort_by(|a, b| a.0.cmp(&b.0));
        let mut block = String::from("The user is working with these files:\n");
        for (name, text) in &sections {
            block.push_str(&format!("\n--- {name} ---\n{text}\n"));
        }

        ctx.processed_content
            .metadata
            .insert(META_ACTIVE_FILE_BLOCK.to_string(), Value::String(block));
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, tokens: u32) -> ActiveFileRef {
        ActiveFileRef {
            blob_id: name.replace('.', "-"),
            name: name.to_string(),
            token_estimate: tokens,
        }
    }

    #[test]
    fn selection_respects_token_budget() {
        let services = crate::test_support::container();
        let injector = ActiveFileInjector::new(services);
        // Budget from test config is 100 tokens.
        let files = vec![file("a.txt", 60), file("b.txt", 60), file("c.txt", 30)];
        let selected = injector.select(&files);
        let names: Vec<&str> = selected.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
    }
}
