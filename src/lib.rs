//! vocadub: word-aligned song dubbing.
//!
//! Takes one recording of a sung performance, extracts acoustic features
//! and word-level transcription timestamps for a region, partitions the
//! region into translation-ready line chunks, and re-projects independently
//! generated replacement audio back onto the absolute timeline of the
//! source recording.
//!
//! The pipeline is batch-oriented and single-threaded: each region is
//! processed to completion before the next begins. External collaborators
//! (transcription, synthesis) are consumed through narrow HTTP interfaces
//! with a caller-imposed timeout and a retry-once policy.

pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod runs;
pub mod segment;
pub mod synthesis;
pub mod timeline;
pub mod transcript;

pub use config::{PipelineConfig, SynthesizerConfig, TargetLanguage, TranscriberConfig};
pub use error::{DubError, Result};
