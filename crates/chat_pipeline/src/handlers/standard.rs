//! Standard chat handler: the default terminal stage.
//!
//! Merges enriched and processed content into the final messages, handles
//! the priority special cases (transcript-only turn, flagged file
//! failure), dispatches to the per-provider handler, and wraps streamed
//! output with the citation-marker processor and the metadata tail.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chat_core::Message;
use futures_util::StreamExt;
use provider_llm::{handler_for, ChatChunk, ChatOutcome, ChatRequest};

use crate::context::{
    ChatContext, ChatResponse, ExecutionStrategy, ProcessedFileKind, META_ACTIVE_FILE_BLOCK,
    META_FILE_FAILURE, META_FILE_FAILURE_REASON, META_KB_SYSTEM_PROMPT,
};
use crate::error::PipelineError;
use crate::processors::{FAILURE_REASON_MISSING_TOOLING, FAILURE_REASON_NO_AUDIO_TRACK};
use crate::services::ServiceContainer;
use crate::stage::Stage;
use crate::streaming::citations::{AgentMarkerSyntax, CitationScanState};
use crate::streaming::metadata::{ResponseMetadata, TranscriptInfo};

const MSG_NO_AUDIO_TRACK: &str = "We couldn't find an audio track in your video file. \
Please check the file and upload one that contains audio.";
const MSG_MISSING_TOOLING: &str = "Audio and video processing is temporarily unavailable. \
Please try again later, or upload the content as text.";
const MSG_FILE_GENERIC: &str = "We couldn't process your attached file. \
Please check the file and try again.";

pub struct StandardChatHandler {
    services: Arc<ServiceContainer>,
}

impl StandardChatHandler {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }

    fn failure_message(reason: &str) -> &'static str {
        match reason {
            FAILURE_REASON_NO_AUDIO_TRACK => MSG_NO_AUDIO_TRACK,
            FAILURE_REASON_MISSING_TOOLING => MSG_MISSING_TOOLING,
            _ => MSG_FILE_GENERIC,
        }
    }

    /// Base metadata shared by streamed and batched responses.
    fn base_metadata(ctx: &ChatContext) -> ResponseMetadata {
        ResponseMetadata {
            citations: ctx.citations(),
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

    /// Compose the effective system prompt: knowledge-base override (or
    /// the request prompt), tone, and the active-file block.
    fn compose_system_prompt(ctx: &ChatContext) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();

        let kb_override = ctx
            .processed_content
            .metadata
            .get(META_KB_SYSTEM_PROMPT)
            .and_then(|v| v.as_str())
            .map(str::to_string);
        match (kb_override, &ctx.request.system_prompt) {
            (Some(kb), _) => parts.push(kb),
            (None, Some(prompt)) => parts.push(prompt.clone()),
            (None, None) => {}
        }

        if let Some(tone) = &ctx.request.tone {
            let mut line = format!("Respond in a {} tone.", tone.style);
            if let Some(description) = &tone.description {
                line.push(' ');
                line.push_str(description);
            }
            parts.push(line);
        }

        if let Some(block) = ctx
            .processed_content
            .metadata
            .get(META_ACTIVE_FILE_BLOCK)
            .and_then(|v| v.as_str())
        {
            parts.push(block.to_string());
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Final message assembly: merge processed content into the last
    /// message, then strip internal-only parts from every message.
    fn assemble_messages(&self, ctx: &ChatContext) -> Vec<Message> {
        let mut messages = ctx.effective_messages().to_vec();

        if let Some(last) = messages.last_mut() {
            for file in &ctx.processed_content.files {
                match &file.kind {
                    ProcessedFileKind::Inline { text } => {
                        last.content
                            .push_text(format!("\n\n[File: {}]\n{}", file.name, text));
                    }
                    ProcessedFileKind::Summary { text } => {
                        last.content.push_text(format!(
                            "\n\n[File summary: {}]\n{}",
                            file.name, text
                        ));
                    }
                    _ => {}
                }
            }
            for transcript in &ctx.processed_content.transcripts {
                last.content.push_text(format!(
                    "\n\n[Transcript: {}]\n{}",
                    transcript.file_name, transcript.text
                ));
            }
            if ctx.request.model.supports_vision {
                for url in &ctx.processed_content.images {
                    let content = std::mem::replace(
                        &mut last.content,
                        chat_core::MessageContent::Text(String::new()),
                    );
                    last.content = match content {
                        chat_core::MessageContent::Text(text) => {
                            chat_core::MessageContent::Parts(vec![
                                chat_core::ContentPart::text(text),
                                chat_core::ContentPart::image(url.clone()),
                            ])
                        }
                        chat_core::MessageContent::Parts(mut parts) => {
                            parts.push(chat_core::ContentPart::image(url.clone()));
                            chat_core::MessageContent::Parts(parts)
                        }
                    };
                }
            }
        }

        // Internal-only parts must never reach a provider call.
        for message in &mut messages {
            message.content = message.content.without_file_refs();
        }
        messages
    }

    fn wrap_stream(
        ctx: &ChatContext,
        mut stream: provider_llm::LLMStream,
        metadata: ResponseMetadata,
    ) -> ChatResponse {
        let cancel = ctx.cancel.clone();
        let pace_ms = ctx.request.streaming_speed_ms;
        let offset = metadata.citations.len();

        let out = async_stream::try_stream! {
            let syntax = AgentMarkerSyntax;
            let mut scan = CitationScanState::new(offset);

            while let Some(chunk) = stream.next().await {
                if cancel.is_cancelled() {
                    log::info!("stream consumption stopped by cancellation");
                    break;
                }
                match chunk.map_err(PipelineError::Llm)? {
                    ChatChunk::Delta(delta) => {
                        let out = scan.push(&syntax, &delta);
                        if !out.is_empty() {
                            yield Bytes::from(out);
                        }
                        if let Some(ms) = pace_ms {
                            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                        }
                    }
                    ChatChunk::Done { .. } => break,
                }
            }

            let tail = scan.flush(&syntax);
            if !tail.is_empty() {
                yield Bytes::from(tail);
            }
            if let Some(block) = metadata.render() {
                yield Bytes::from(block);
            }
        };

        ChatResponse::Stream(Box::pin(out))
    }
}

#[async_trait]
impl Stage for StandardChatHandler {
    fn name(&self) -> &str {
        "standard_chat"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        ctx.execution_strategy == ExecutionStrategy::Standard
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        let start = Instant::now();

        // Transcript-only turn: the user sent audio with no real text.
        // Return the transcript directly, no model call.
        let user_text = ctx
            .request
            .messages
            .last()
            .map(Message::text)
            .unwrap_or_default();
        if user_text.trim().is_empty() && !ctx.processed_content.transcripts.is_empty() {
            let text = ctx
                .processed_content
                .transcripts
                .iter()
                .map(|t| t.text.clone())
                .collect::<Vec<_>>()
                .join("\n\n");
            let metadata = Self::base_metadata(&ctx);
            log::info!("returning transcript-only response without model call");
            ctx.response = Some(ChatResponse::Text { text, metadata });
            return Ok(ctx);
        }

        // Flagged file failure: a tailored plain-text error beats a chat
        // response built on meaningless content.
        if ctx.processed_content.metadata_flag(META_FILE_FAILURE) {
            let reason = ctx
                .processed_content
                .metadata
                .get(META_FILE_FAILURE_REASON)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            log::info!("surfacing file-processing failure ({reason}) instead of chat response");
            ctx.response = Some(ChatResponse::Text {
                text: Self::failure_message(&reason).to_string(),
                metadata: ResponseMetadata::default(),
            });
            return Ok(ctx);
        }

        let messages = self.assemble_messages(&ctx);
        let mut request = ChatRequest::new(ctx.request.model.clone(), messages);
        request.system_prompt = Self::compose_system_prompt(&ctx);
        request.temperature = ctx.request.temperature;
        request.stream = ctx.request.stream;
        request.reasoning_effort = ctx.request.reasoning_effort.clone();
        request.verbosity = ctx.request.verbosity.clone();

        let handler = handler_for(&request.model, &self.services.providers);
        let outcome = handler.execute(&request).await.map_err(|e| {
            log::error!(
                "provider call failed after {}ms for {}: {e}",
                start.elapsed().as_millis(),
                ctx.user.id
            );
            e
        })?;

        let metadata = Self::base_metadata(&ctx);
        ctx.response = Some(match outcome {
            ChatOutcome::Stream(stream) => Self::wrap_stream(&ctx, stream, metadata),
            ChatOutcome::Completion(text) => {
                let syntax = AgentMarkerSyntax;
                let mut scan = CitationScanState::new(metadata.citations.len());
                let mut rewritten = scan.push(&syntax, &text);
                rewritten.push_str(&scan.flush(&syntax));
                ChatResponse::Text {
                    text: rewritten,
                    metadata,
                }
            }
        });

        log::info!(
            "standard chat dispatched for {} in {}ms",
            ctx.user.id,
            start.elapsed().as_millis()
        );
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Transcript;
    use crate::test_support;

    #[tokio::test]
    async fn transcript_only_turn_skips_the_model() {
        let services = test_support::container();
        let handler = StandardChatHandler::new(services);

        let mut ctx = test_support::context_with_user_text("");
        ctx.processed_content.transcripts.push(Transcript {
            file_name: "memo.mp3".into(),
            text: "the transcript".into(),
            placeholder: false,
        });

        let ctx = handler.execute(ctx).await.unwrap();
        match ctx.response.unwrap() {
            ChatResponse::Text { text, metadata } => {
                assert_eq!(text, "the transcript");
                assert_eq!(metadata.transcripts.len(), 1);
            }
            _ => panic!("expected text response"),
        }
    }

    #[tokio::test]
    async fn flagged_file_failure_returns_known_template() {
        let services = test_support::container();
        let handler = StandardChatHandler::new(services);

        let mut ctx = test_support::context_with_user_text("what does my video say?");
        ctx.processed_content.metadata.insert(
            META_FILE_FAILURE.to_string(),
            serde_json::Value::Bool(true),
        );
        ctx.processed_content.metadata.insert(
            META_FILE_FAILURE_REASON.to_string(),
            serde_json::Value::String(FAILURE_REASON_NO_AUDIO_TRACK.to_string()),
        );

        let ctx = handler.execute(ctx).await.unwrap();
        match ctx.response.unwrap() {
            ChatResponse::Text { text, .. } => assert_eq!(text, MSG_NO_AUDIO_TRACK),
            _ => panic!("expected text response"),
        }
    }

    #[test]
    fn system_prompt_prefers_knowledge_base_override() {
        let mut ctx = test_support::context_with_user_text("q");
        ctx.request.system_prompt = Some("generic".into());
        ctx.processed_content.metadata.insert(
            META_KB_SYSTEM_PROMPT.to_string(),
            serde_json::Value::String("kb prompt".into()),
        );
        let prompt = StandardChatHandler::compose_system_prompt(&ctx).unwrap();
        assert!(prompt.contains("kb prompt"));
        assert!(!prompt.contains("generic"));
    }
}
