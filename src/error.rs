//! Error types for the dubbing pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the dubbing pipeline.
#[derive(Debug, Error)]
pub enum DubError {
    /// An expected upstream artifact (run folder, record, audio file) is
    /// absent. Always fatal for the current stage, never retried.
    #[error("missing artifact: {0}")]
    MissingArtifact(PathBuf),

    /// A structural invariant of a record or chunk plan does not hold:
    /// dual-frame mismatch, non-contiguous word indices, partition gaps.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    #[error("audio processing error: {0}")]
    AudioProcessing(String),

    #[error("time stretching error: {0}")]
    TimeStretching(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV encoding error: {0}")]
    WavEncoding(#[from] hound::Error),

    #[error("WAV decoding error: {0}")]
    WavDecoding(hound::Error),
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, DubError>;
