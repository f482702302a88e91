//! Code-interpreter stream transformer.
//!
//! Renders code input and execution logs inline as markdown fences and
//! collects generated file references as structured outputs in the
//! metadata tail instead of inline text.

use agent_client::{AgentEvent, AgentEventStream, FileOutputKind};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::context::ResponseStream;
use crate::error::PipelineError;
use crate::streaming::citations::{AgentMarkerSyntax, CitationScanState};
use crate::streaming::metadata::{CodeInterpreterMeta, GeneratedFile};

use super::StreamSetup;

#[derive(PartialEq)]
enum Section {
    Text,
    Code,
    Logs,
}

fn transition(current: &mut Section, next: Section) -> Option<&'static str> {
    if *current == next {
        return None;
    }
    let fence = match (&*current, &next) {
        (Section::Text, Section::Code) => Some("\n```python\n"),
        (Section::Text, Section::Logs) => Some("\n```\n"),
        (Section::Code, Section::Text) | (Section::Logs, Section::Text) => Some("\n```\n"),
        (Section::Code, Section::Logs) => Some("\n```\n\n```\n"),
        (Section::Logs, Section::Code) => Some("\n```\n\n```python\n"),
        _ => None,
    };
    *current = next;
    fence
}

pub(super) fn create_stream(mut events: AgentEventStream, setup: StreamSetup) -> ResponseStream {
    let stream = async_stream::try_stream! {
        let syntax = AgentMarkerSyntax;
        let mut scan = CitationScanState::new(setup.existing_citations.len());
        let mut section = Section::Text;
        let mut generated: Vec<GeneratedFile> = Vec::new();
        let mut failed: Option<String> = None;

        while let Some(event) = events.next().await {
            if setup.cancel.is_cancelled() {
                log::info!("stream consumption stopped by cancellation");
                break;
            }
            match event.map_err(PipelineError::Agent)? {
                AgentEvent::MessageDelta { text, .. } => {
                    if let Some(fence) = transition(&mut section, Section::Text) {
                        yield Bytes::from(fence);
                    }
                    let out = scan.push(&syntax, &text);
                    if !out.is_empty() {
                        yield Bytes::from(out);
                    }
                }
                AgentEvent::CodeInput { code } => {
                    if let Some(fence) = transition(&mut section, Section::Code) {
                        yield Bytes::from(fence);
                    }
                    yield Bytes::from(code);
                }
                AgentEvent::CodeLogs { logs } => {
                    if let Some(fence) = transition(&mut section, Section::Logs) {
                        yield Bytes::from(fence);
                    }
                    yield Bytes::from(logs);
                }
                AgentEvent::FileOutput { file_id, kind } => {
                    generated.push(GeneratedFile {
                        file_id,
                        kind: match kind {
                            FileOutputKind::Image => "image".to_string(),
                            FileOutputKind::File => "file".to_string(),
                        },
                    });
                }
                AgentEvent::ThreadCreated { .. } => {}
                AgentEvent::Completed => break,
                AgentEvent::Failed { message } => {
                    failed = Some(message);
                    break;
                }
            }
        }

        if section != Section::Text {
            yield Bytes::from("\n```\n");
        }
        let tail = scan.flush(&syntax);
        if !tail.is_empty() {
            yield Bytes::from(tail);
        }

        if let Some(message) = failed {
            Err(PipelineError::Stream(message))?;
        }

        let mut metadata = setup.base_metadata.clone();
        metadata.thread_id = setup.created_thread_id.clone();
        metadata.citations = setup.existing_citations.clone();
        if !generated.is_empty() {
            metadata.code_interpreter = Some(CodeInterpreterMeta { files: generated });
        }
        if let Some(block) = metadata.render() {
            yield Bytes::from(block);
        }
    };

    Box::pin(stream)
}
