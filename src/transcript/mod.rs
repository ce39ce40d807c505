//! Word-level transcripts with dual-frame timing.
//!
//! Every word carries both a region-relative and an absolute-file
//! timestamp: relative time drives synthesis and chunking, absolute time
//! drives final placement, and both travel with the record rather than
//! being recomputed from one context.

pub mod aligner;
pub mod enricher;

use serde::{Deserialize, Serialize};

/// A start/end pair in seconds plus its derived duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f32,
    pub end: f32,
    pub duration: f32,
}

impl TimeSpan {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end, duration: end - start }
    }

    /// Shifts both endpoints by `offset` seconds.
    pub fn shifted(&self, offset: f32) -> Self {
        Self::new(self.start + offset, self.end + offset)
    }
}

/// One transcribed token with dual-frame timing and optional acoustic
/// enrichment. Enrichment fields stay `None` when no feature sample falls
/// inside the word; a zero would be indistinguishable from a real quiet
/// or low-pitch measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpan {
    /// 0-based sequence position, contiguous within a transcript.
    pub index: usize,
    #[serde(rename = "word")]
    pub text: String,
    #[serde(rename = "time_relative")]
    pub relative: TimeSpan,
    #[serde(rename = "time_absolute")]
    pub absolute: TimeSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_pitch_hz: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pitch_hz: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pitch_hz: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_energy_db: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_energy_db: Option<f32>,
    /// Word start minus nearest onset time, signed. Large magnitude flags
    /// likely misalignment but never blocks processing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearest_onset_offset: Option<f32>,
}

impl WordSpan {
    /// Builds a word span from region-relative bounds, deriving the
    /// absolute frame from the region's start position.
    pub fn from_relative(
        index: usize,
        text: impl Into<String>,
        relative_start: f32,
        relative_end: f32,
        region_absolute_start: f32,
    ) -> Self {
        let relative = TimeSpan::new(relative_start, relative_end);
        Self {
            index,
            text: text.into(),
            relative,
            absolute: relative.shifted(region_absolute_start),
            avg_pitch_hz: None,
            min_pitch_hz: None,
            max_pitch_hz: None,
            avg_energy_db: None,
            max_energy_db: None,
            nearest_onset_offset: None,
        }
    }
}

/// A coarser utterance-level span returned by the transcription engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseSpan {
    pub text: String,
    pub start: f32,
    pub end: f32,
}

/// A validated transcript for one region. `words` may legitimately be
/// empty when the engine returned only phrase-level data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub full_text: String,
    pub language: Option<String>,
    pub words: Vec<WordSpan>,
    pub segments: Vec<PhraseSpan>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_frame_construction() {
        let word = WordSpan::from_relative(0, "mano", 1.5, 2.0, 93.0);
        assert_eq!(word.relative.start, 1.5);
        assert_eq!(word.absolute.start, 94.5);
        assert_eq!(word.absolute.end, 95.0);
        assert!((word.absolute.duration - word.relative.duration).abs() < 1e-6);
    }

    #[test]
    fn word_serializes_with_dual_frame_keys() {
        let word = WordSpan::from_relative(3, "feliz", 0.25, 0.75, 10.0);
        let json = serde_json::to_value(&word).unwrap();
        assert_eq!(json["word"], "feliz");
        assert!((json["time_relative"]["start"].as_f64().unwrap() - 0.25).abs() < 1e-6);
        assert!((json["time_absolute"]["end"].as_f64().unwrap() - 10.75).abs() < 1e-6);
        assert!(json.get("avg_pitch_hz").is_none());
    }
}
