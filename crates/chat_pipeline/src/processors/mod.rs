//! Content processors: extract and normalize raw attachment content into
//! structured text before any enrichment runs.

mod active_files;
mod files;
mod images;

pub use active_files::ActiveFileInjector;
pub use files::{
    FileProcessor, FAILURE_REASON_GENERIC, FAILURE_REASON_MISSING_TOOLING,
    FAILURE_REASON_NO_AUDIO_TRACK,
};
pub use images::ImageProcessor;
