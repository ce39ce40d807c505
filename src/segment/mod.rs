//! The canonical segment record: a region's audio reference, absolute and
//! relative time coordinates, transcript and enriched word list.

pub mod chunker;
pub mod persist;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DubError, Result};
use crate::features::{FeatureSeries, SilenceGap};
use crate::transcript::WordSpan;

/// Tolerance for dual-frame consistency checks, in seconds.
const FRAME_EPSILON: f32 = 1e-3;

/// A contiguous span of a source audio file, anchored to absolute
/// (original-file) coordinates. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformRegion {
    /// The recording this region was cut from.
    pub source_path: PathBuf,
    pub absolute_start: f32,
    pub absolute_end: f32,
    pub sample_rate: u32,
    /// Must be 1 after extraction; the pipeline works on mono audio only.
    pub channel_count: u16,
}

impl WaveformRegion {
    pub fn new(
        source_path: impl Into<PathBuf>,
        absolute_start: f32,
        absolute_end: f32,
        sample_rate: u32,
    ) -> Result<Self> {
        if absolute_end <= absolute_start {
            return Err(DubError::DataIntegrity(format!(
                "region end {absolute_end} not after start {absolute_start}"
            )));
        }
        Ok(Self {
            source_path: source_path.into(),
            absolute_start,
            absolute_end,
            sample_rate,
            channel_count: 1,
        })
    }

    pub fn duration(&self) -> f32 {
        self.absolute_end - self.absolute_start
    }
}

/// The unit persisted and handed to downstream stages. Created once per
/// analyzed region; trimming produces a new record, never mutates the
/// original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub region: WaveformRegion,
    pub features: FeatureSeries,
    pub words: Vec<WordSpan>,
    pub full_text: String,
    pub detected_language: Option<String>,
    pub silence_gaps: Vec<SilenceGap>,
}

impl SegmentRecord {
    /// Builds and validates a record. Downstream placement logic assumes
    /// these invariants hold unconditionally, so violations are
    /// structural errors here rather than warnings later.
    pub fn new(
        region: WaveformRegion,
        features: FeatureSeries,
        words: Vec<WordSpan>,
        full_text: String,
        detected_language: Option<String>,
        silence_gaps: Vec<SilenceGap>,
    ) -> Result<Self> {
        let record = Self {
            region,
            features,
            words,
            full_text,
            detected_language,
            silence_gaps,
        };
        record.validate()?;
        Ok(record)
    }

    /// Checks dual-frame consistency, word ordering and feature series
    /// invariants.
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;

        for (position, word) in self.words.iter().enumerate() {
            if word.index != position {
                return Err(DubError::DataIntegrity(format!(
                    "word index {} at position {position} is not contiguous",
                    word.index
                )));
            }
            if word.relative.end <= word.relative.start {
                return Err(DubError::DataIntegrity(format!(
                    "word '{}' has non-positive duration",
                    word.text
                )));
            }
            let anchor = word.absolute.start - word.relative.start;
            if (anchor - self.region.absolute_start).abs() > FRAME_EPSILON {
                return Err(DubError::DataIntegrity(format!(
                    "word '{}' dual-frame mismatch: anchor {anchor:.3} vs region start {:.3}",
                    word.text, self.region.absolute_start
                )));
            }
        }

        if self
            .words
            .windows(2)
            .any(|pair| pair[1].relative.start < pair[0].relative.end - FRAME_EPSILON)
        {
            return Err(DubError::DataIntegrity("overlapping word spans".into()));
        }

        Ok(())
    }

    /// First word whose text matches `target` case-insensitively.
    pub fn find_word(&self, target: &str) -> Option<&WordSpan> {
        self.words
            .iter()
            .find(|w| w.text.eq_ignore_ascii_case(target))
    }

    /// Produces a trimmed derivative ending at the word with index
    /// `word_index`: its words list has exactly `word_index + 1` entries,
    /// and region/feature data past the trim point are absent. The parent
    /// record is untouched.
    pub fn trimmed_at_word_index(&self, word_index: usize) -> Result<SegmentRecord> {
        let last = self.words.get(word_index).ok_or_else(|| {
            DubError::DataIntegrity(format!(
                "trim index {word_index} out of range ({} words)",
                self.words.len()
            ))
        })?;

        let cutoff = last.relative.end;
        let words: Vec<WordSpan> = self.words[..=word_index].to_vec();
        let full_text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let region = WaveformRegion {
            source_path: self.region.source_path.clone(),
            absolute_start: self.region.absolute_start,
            absolute_end: self.region.absolute_start + cutoff,
            sample_rate: self.region.sample_rate,
            channel_count: self.region.channel_count,
        };

        let silence_gaps = self
            .silence_gaps
            .iter()
            .copied()
            .filter(|g| g.end <= cutoff)
            .collect();

        SegmentRecord::new(
            region,
            self.features.truncated_at(cutoff),
            words,
            full_text,
            self.detected_language.clone(),
            silence_gaps,
        )
    }
}
