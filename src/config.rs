//! Pipeline configuration.
//!
//! Every stage receives an explicit configuration object at construction;
//! nothing is read from process-wide state except the API key, which the
//! binaries resolve once and pass down.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DubError;

/// Target language for the regenerated vocals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetLanguage {
    Spanish,
    Russian,
    Italian,
}

impl Default for TargetLanguage {
    fn default() -> Self {
        Self::Spanish
    }
}

impl TargetLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spanish => "spanish",
            Self::Russian => "russian",
            Self::Italian => "italian",
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = DubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spanish" | "es" => Ok(Self::Spanish),
            "russian" | "ru" => Ok(Self::Russian),
            "italian" | "it" => Ok(Self::Italian),
            other => Err(DubError::Config(format!("unknown target language: {other}"))),
        }
    }
}

/// Configuration shared by all pipeline stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base directory holding timestamped run folders.
    pub run_directory: PathBuf,
    /// Target language for synthesis.
    pub language: TargetLanguage,
    /// Number of line chunks each segment is split into.
    pub chunk_count: usize,
    /// Symmetric padding around a chunk's word boundaries, in milliseconds.
    /// Clamped to 100 ms.
    pub padding_ms: u32,
    /// Relative duration drift tolerated before rate correction is applied.
    pub duration_tolerance: f32,
    /// Word-start to nearest-onset offset beyond which an alignment
    /// warning is logged. Advisory only.
    pub onset_offset_tolerance: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_directory: PathBuf::from("data/analysis"),
            language: TargetLanguage::default(),
            chunk_count: 4,
            padding_ms: 50,
            duration_tolerance: 0.15,
            onset_offset_tolerance: 0.3,
        }
    }
}

impl PipelineConfig {
    /// Padding in seconds, clamped to the 100 ms ceiling.
    pub fn padding_secs(&self) -> f32 {
        self.padding_ms.min(100) as f32 / 1000.0
    }
}

/// Configuration for the transcription collaborator.
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// Endpoint accepting multipart transcription requests.
    pub endpoint: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Per-request timeout; both collaborators are model-latency-bound
    /// and may stall without one.
    pub timeout: Duration,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            api_key: String::new(),
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Configuration for the cross-lingual synthesis collaborator.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Endpoint of the synthesis service.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// Sample rate the reference prompt must be resampled to.
    pub prompt_sample_rate: u32,
    /// Playback speed requested from the engine. Kept at 1.0 so timing
    /// drift is handled by the reconciler, not the engine.
    pub speed: f32,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:50000/inference_cross_lingual".to_string(),
            model: "CosyVoice-300M".to_string(),
            prompt_sample_rate: 16_000,
            speed: 1.0,
            timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_round_trip() {
        for lang in [TargetLanguage::Spanish, TargetLanguage::Russian, TargetLanguage::Italian] {
            assert_eq!(lang.as_str().parse::<TargetLanguage>().unwrap(), lang);
        }
        assert!("klingon".parse::<TargetLanguage>().is_err());
    }

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.language, TargetLanguage::Spanish);
        assert_eq!(config.chunk_count, 4);
        assert!((config.duration_tolerance - 0.15).abs() < f32::EPSILON);
    }

    #[test]
    fn padding_is_clamped() {
        let config = PipelineConfig {
            padding_ms: 250,
            ..PipelineConfig::default()
        };
        assert!((config.padding_secs() - 0.1).abs() < f32::EPSILON);
    }
}
