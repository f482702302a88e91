//! File processor.
//!
//! For every file reference in the last message: validate the remote size
//! against the hard ceiling before any transfer, download into the temp
//! sandbox, then extract text (inline or summarized against the model's
//! character budget) or route audio/video to transcription. Validation
//! and download run concurrently across files; extraction and
//! transcription run sequentially to respect downstream rate limits. One
//! failing file never aborts the others.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use chat_core::ContentPart;
use serde_json::Value;

use crate::context::{
    is_audio, is_image, is_video, ChatContext, ProcessedFile, ProcessedFileKind, Transcript,
    META_FILE_FAILURE, META_FILE_FAILURE_REASON,
};
use crate::error::PipelineError;
use crate::services::ServiceContainer;
use crate::stage::Stage;

pub const FAILURE_REASON_NO_AUDIO_TRACK: &str = "no_audio_track";
pub const FAILURE_REASON_MISSING_TOOLING: &str = "missing_tooling";
pub const FAILURE_REASON_GENERIC: &str = "generic";

const SUMMARY_SYSTEM: &str = "Summarize the following document faithfully and concisely. \
Preserve key facts, figures, names, and dates. Respond with the summary only.";

/// Extensions whose bytes are text and can be decoded directly.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "tsv", "json", "xml", "yaml", "yml", "html", "log",
];

pub(crate) fn transcript_placeholder(job_id: &str) -> String {
    format!("[Audio transcription in progress - job {job_id}]")
}

struct FileRef {
    blob_id: String,
    name: String,
    path: String,
}

enum FetchOutcome {
    Fetched(Bytes),
    Failed(String),
}

pub struct FileProcessor {
    services: Arc<ServiceContainer>,
}

impl FileProcessor {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }

    fn collect_refs(ctx: &ChatContext) -> Vec<FileRef> {
        let Some(last) = ctx.request.messages.last() else {
            return Vec::new();
        };
        last.content
            .parts()
            .iter()
            .filter_map(|part| match part {
                ContentPart::FileUrl { url, name } => {
                    let blob_id = url.rsplit('/').next().unwrap_or(url).to_string();
                    Some(FileRef {
                        blob_id,
                        name: name.clone().unwrap_or_else(|| url.clone()),
                        path: url.clone(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Size gate then transfer. An oversized file is rejected before any
    /// part of the body is buffered.
    async fn validate_and_fetch(&self, file: &FileRef) -> FetchOutcome {
        if let Err(e) = blob_store::validate_blob_id(&file.blob_id) {
            return FetchOutcome::Failed(e.to_string());
        }

        let size = match self.services.blob.get_blob_size(&file.path).await {
            Ok(size) => size,
            Err(e) => return FetchOutcome::Failed(e.to_string()),
        };
        if size > self.services.config.max_file_bytes {
            return FetchOutcome::Failed(format!(
                "file {} exceeds the {} byte limit",
                file.name, self.services.config.max_file_bytes
            ));
        }

        match self.services.blob.get(&file.path).await {
            Ok(bytes) => FetchOutcome::Fetched(bytes),
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }

    async fn process_one(
        &self,
        ctx: &mut ChatContext,
        file: &FileRef,
        bytes: Bytes,
    ) -> Result<(), String> {
        if is_video(&file.name) {
            let audio = self.extract_audio_track(file, &bytes).await?;
            self.transcribe_audio(ctx, file, audio).await
        } else if is_audio(&file.name) {
            self.transcribe_audio(ctx, file, bytes).await
        } else if is_image(&file.name) {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            let ext = crate::context::file_extension(&file.name);
            ctx.processed_content
                .images
                .push(format!("data:image/{ext};base64,{encoded}"));
            ctx.processed_content.files.push(ProcessedFile {
                blob_id: file.blob_id.clone(),
                name: file.name.clone(),
                kind: ProcessedFileKind::Image,
                raw: None,
            });
            Ok(())
        } else {
            self.extract_document(ctx, file, bytes).await
        }
    }

    /// Extract the audio track from a video container.
    ///
    /// Both failure modes here are user-facing and non-retryable: a
    /// missing extraction tool and a video with no audio track each get
    /// their own message instead of a generic failure.
    async fn extract_audio_track(&self, file: &FileRef, bytes: &Bytes) -> Result<Bytes, String> {
        let input = self
            .services
            .sandbox
            .write(&file.blob_id, bytes)
            .await
            .map_err(|e| e.to_string())?;
        let output_id = format!("{}.extracted.mp3", file.blob_id);
        let output_path = self
            .services
            .sandbox
            .path_for(&output_id)
            .map_err(|e| e.to_string())?;

        let result = tokio::process::Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input.path())
            .arg("-vn")
            .arg("-acodec")
            .arg("libmp3lame")
            .arg(&output_path)
            .output()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FAILURE_REASON_MISSING_TOOLING.to_string());
            }
            Err(e) => return Err(e.to_string()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let _ = tokio::fs::remove_file(&output_path).await;
            if stderr.contains("does not contain any stream")
                || stderr.contains("Output file is empty")
            {
                return Err(FAILURE_REASON_NO_AUDIO_TRACK.to_string());
            }
            return Err(format!("audio extraction failed: {}", stderr.trim()));
        }

        let audio = tokio::fs::read(&output_path)
            .await
            .map_err(|e| e.to_string())?;
        let _ = tokio::fs::remove_file(&output_path).await;
        Ok(Bytes::from(audio))
    }

    /// Route audio by size: synchronous transcription at or under the
    /// threshold, asynchronous chunked job above it. The async job's
    /// transcript arrives out-of-band; downstream sees a placeholder.
    async fn transcribe_audio(
        &self,
        ctx: &mut ChatContext,
        file: &FileRef,
        audio: Bytes,
    ) -> Result<(), String> {
        if audio.len() as u64 <= self.services.config.audio_sync_threshold_bytes {
            let text = self
                .services
                .transcriber
                .transcribe(audio, &file.name)
                .await
                .map_err(|e| e.to_string())?;
            ctx.processed_content.transcripts.push(Transcript {
                file_name: file.name.clone(),
                text,
                placeholder: false,
            });
        } else {
            let pending = self
                .services
                .transcriber
                .submit_chunked(audio, &file.name)
                .await
                .map_err(|e| e.to_string())?;
            log::info!(
                "submitted chunked transcription job {} ({} chunks) for {}",
                pending.job_id,
                pending.chunk_count,
                file.name
            );
            ctx.processed_content.transcripts.push(Transcript {
                file_name: file.name.clone(),
                text: transcript_placeholder(&pending.job_id),
                placeholder: true,
            });
            ctx.processed_content.pending_transcriptions.push(pending);
        }
        ctx.processed_content.files.push(ProcessedFile {
            blob_id: file.blob_id.clone(),
            name: file.name.clone(),
            kind: ProcessedFileKind::Transcript,
            raw: None,
        });
        Ok(())
    }

    /// Extract document text and apply the inline-vs-summary split.
    async fn extract_document(
        &self,
        ctx: &mut ChatContext,
        file: &FileRef,
        bytes: Bytes,
    ) -> Result<(), String> {
        // Temp copy exists for the duration of extraction; the guard
        // removes it on every exit path.
        let _guard = self
            .services
            .sandbox
            .write(&file.blob_id, &bytes)
            .await
            .map_err(|e| e.to_string())?;

        let text = self.extract_text(file, &bytes).await?;

        let budget = self
            .services
            .config
            .inline_char_budget(ctx.request.model.token_limit);

        let kind = if text.chars().count() <= budget {
            ProcessedFileKind::Inline { text }
        } else {
            let summary = self
                .services
                .aux
                .complete(SUMMARY_SYSTEM, &text)
                .await
                .map_err(|e| e.to_string())?;
            ProcessedFileKind::Summary { text: summary }
        };

        ctx.processed_content.files.push(ProcessedFile {
            blob_id: file.blob_id.clone(),
            name: file.name.clone(),
            kind,
            raw: Some(bytes),
        });
        Ok(())
    }

    async fn extract_text(&self, file: &FileRef, bytes: &Bytes) -> Result<String, String> {
        let ext = crate::context::file_extension(&file.name);
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(String::from_utf8_lossy(bytes).into_owned());
        }

        // Binary documents rely on the parallel pre-extracted text blob.
        let cached = format!("{}.txt", file.path);
        match self.services.blob.blob_exists(&cached).await {
            Ok(true) => {
                let text = self
                    .services
                    .blob
                    .get(&cached)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(String::from_utf8_lossy(&text).into_owned())
            }
            Ok(false) => Err(format!("no extracted text available for {}", file.name)),
            Err(e) => Err(e.to_string()),
        }
    }

    fn mark_failure(ctx: &mut ChatContext, file_name: &str, reason: &str) {
        let known = matches!(
            reason,
            FAILURE_REASON_NO_AUDIO_TRACK | FAILURE_REASON_MISSING_TOOLING
        );
        let reason_key = if known { reason } else { FAILURE_REASON_GENERIC };

        ctx.processed_content.files.push(ProcessedFile {
            blob_id: String::new(),
            name: file_name.to_string(),
            kind: ProcessedFileKind::Error {
                reason: reason.to_string(),
            },
            raw: None,
        });
        ctx.processed_content
            .metadata
            .insert(META_FILE_FAILURE.to_string(), Value::Bool(true));
        ctx.processed_content.metadata.insert(
            META_FILE_FAILURE_REASON.to_string(),
            Value::String(reason_key.to_string()),
        );
        ctx.record_failure("file_processor", format!("{file_name}: {reason}"));
    }
}

#[async_trait]
impl Stage for FileProcessor {
    fn name(&self) -> &str {
        "file_processor"
    }

    fn should_run(&self, ctx: &ChatContext) -> bool {
        ctx.flags.has_files
    }

    async fn execute(&self, mut ctx: ChatContext) -> Result<ChatContext, PipelineError> {
        let refs = Self::collect_refs(&ctx);
        if refs.is_empty() {
            return Ok(ctx);
        }

        // Size validation and transfer fan out across all files at once.
        let fetches =
            futures::future::join_all(refs.iter().map(|file| self.validate_and_fetch(file)))
                .await;

        // Extraction, summarization, and transcription stay sequential:
        // the summarization and transcription backends are rate limited.
        for (file, fetch) in refs.iter().zip(fetches) {
            let bytes = match fetch {
                FetchOutcome::Fetched(bytes) => bytes,
                FetchOutcome::Failed(reason) => {
                    Self::mark_failure(&mut ctx, &file.name, &reason);
                    continue;
                }
            };
            if let Err(reason) = self.process_one(&mut ctx, file, bytes).await {
                Self::mark_failure(&mut ctx, &file.name, &reason);
            }
        }

        Ok(ctx)
    }
}
