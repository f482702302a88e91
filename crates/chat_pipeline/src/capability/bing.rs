//! Web-grounding stream transformer.
//!
//! Rewrites provider citation markers into sequential bracket numbers as
//! deltas arrive and appends the citation list in the metadata tail.

use std::collections::HashMap;

use agent_client::{AgentEvent, AgentEventStream};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::context::{Citation, ResponseStream};
use crate::error::PipelineError;
use crate::streaming::citations::{AgentMarkerSyntax, CitationScanState};

use super::StreamSetup;

pub(super) fn create_stream(mut events: AgentEventStream, setup: StreamSetup) -> ResponseStream {
    let stream = async_stream::try_stream! {
        let syntax = AgentMarkerSyntax;
        let mut scan = CitationScanState::new(setup.existing_citations.len());
        let mut annotations: HashMap<String, (String, String)> = HashMap::new();
        let mut failed: Option<String> = None;

        while let Some(event) = events.next().await {
            if setup.cancel.is_cancelled() {
                log::info!("stream consumption stopped by cancellation");
                break;
            }
            match event.map_err(PipelineError::Agent)? {
                AgentEvent::MessageDelta { text, annotations: new } => {
                    for annotation in new {
                        annotations
                            .entry(annotation.marker)
                            .or_insert((annotation.title, annotation.url));
                    }
                    let out = scan.push(&syntax, &text);
                    if !out.is_empty() {
                        yield Bytes::from(out);
                    }
                }
                AgentEvent::ThreadCreated { .. } => {}
                AgentEvent::Completed => break,
                AgentEvent::Failed { message } => {
                    failed = Some(message);
                    break;
                }
                // Code events do not occur on grounding runs; ignore.
                AgentEvent::CodeInput { .. }
                | AgentEvent::CodeLogs { .. }
                | AgentEvent::FileOutput { .. } => {}
            }
        }

        // A stream that simply ends still flushes and closes cleanly.
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
        for (i, marker) in scan.markers().iter().enumerate() {
            let number = setup.existing_citations.len() + i + 1;
            let (title, url) = annotations
                .get(marker)
                .cloned()
                .unwrap_or_else(|| (marker.clone(), String::new()));
            metadata.citations.push(Citation {
                number,
                title,
                url,
                date: None,
            });
        }
        if let Some(block) = metadata.render() {
            yield Bytes::from(block);
        }
    };

    Box::pin(stream)
}
