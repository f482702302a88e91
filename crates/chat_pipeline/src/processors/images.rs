//! Image pass-through.
//!
//! Image parts in the last message are normalized for the provider call:
//! data URLs pass through untouched, storage-relative references are
//! fetched and base64-inlined.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chat_core::ContentPart;

use crate::context::ChatContext;
use crate::error::PipelineError;
use crate::services::ServiceContainer;
use crate::stage::Stage;

pub struct ImageProcessor {
    services: Arc<ServiceContainer>,
}

impl ImageProcessor {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Stage for ImageProcessor {
    fn name(&self) -> &str {
        "image_processor"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        ctx.flags.has_images
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        let urls: Vec<String> = ctx
            .request
            .messages
            .last()
            .map(|m| {
                m.content
                    .parts()
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::ImageUrl { image_url } => Some(image_url.url.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        for url in urls {
            if url.starts_with("data:") || url.starts_with("http") {
                ctx.processed_content.images.push(url);
                continue;
            }

            // Storage-relative reference: fetch and inline.
            match self.services.blob.get(&url).await {
                Ok(bytes) => {
                    let ext = crate::context::file_extension(&url);
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                    ctx.processed_content
                        .images
                        .push(format!("data:image/{ext};base64,{encoded}"));
                }
                Err(e) => {
                    ctx.record_failure(self.name(), format!("image {url}: {e}"));
                }
            }
        }

        Ok(ctx)
    }
}
