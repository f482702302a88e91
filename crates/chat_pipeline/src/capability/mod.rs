//! Agent capability handlers.
//!
//! A closed set: code interpreter claims the stream only when explicitly
//! enabled; web grounding is the default for everything else. The set is
//! small and fixed, so dispatch is an enum, not an open registry.

mod bing;
mod code_interpreter;

use agent_client::AgentEventStream;
use tokio_util::sync::CancellationToken;

use crate::context::{AgentCapabilities, Citation, ResponseStream};
use crate::streaming::metadata::ResponseMetadata;

/// Inputs shared by both stream transformers.
pub struct StreamSetup {
    /// Citations recorded by earlier stages; numbering continues after
    /// them and they are re-emitted in the metadata tail.
    pub existing_citations: Vec<Citation>,
    /// Set when the thread was created during this request.
    pub created_thread_id: Option<String>,
    /// Metadata carried over from content processing.
    pub base_metadata: ResponseMetadata,
    pub cancel: CancellationToken,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityHandler {
    BingGrounding,
    CodeInterpreter,
}

impl CapabilityHandler {
    /// Mutually exclusive selection over the capability flags.
    pub fn select(capabilities: &AgentCapabilities) -> Self {
        if capabilities.code_interpreter {
            Self::CodeInterpreter
        } else {
            Self::BingGrounding
        }
    }

    pub fn can_handle(&self, capabilities: &AgentCapabilities) -> bool {
        match self {
            Self::CodeInterpreter => capabilities.code_interpreter,
            Self::BingGrounding => !capabilities.code_interpreter,
        }
    }

    /// Transform the run's event stream into processed response text.
    pub fn create_stream(&self, events: AgentEventStream, setup: StreamSetup) -> ResponseStream {
        match self {
            Self::BingGrounding => bing::create_stream(events, setup),
            Self::CodeInterpreter => code_interpreter::create_stream(events, setup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_mutually_exclusive() {
        let mut capabilities = AgentCapabilities::default();
        capabilities.bing_grounding = true;
        let handler = CapabilityHandler::select(&capabilities);
        assert_eq!(handler, CapabilityHandler::BingGrounding);
        assert!(handler.can_handle(&capabilities));
        assert!(!CapabilityHandler::CodeInterpreter.can_handle(&capabilities));

        capabilities.code_interpreter = true;
        let handler = CapabilityHandler::select(&capabilities);
        assert_eq!(handler, CapabilityHandler::CodeInterpreter);
        assert!(!CapabilityHandler::BingGrounding.can_handle(&capabilities));
    }
}
