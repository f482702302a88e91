//! Stream transformation: citation-marker rewriting and the trailing
//! sentinel metadata block.

pub mod citations;
pub mod metadata;

pub use citations::{AgentMarkerSyntax, CitationScanState, MarkerSyntax};
pub use metadata::{ResponseMetadata, METADATA_END, METADATA_START};
