//! JSON persistence for segment records.
//!
//! The on-disk document groups fields into three blocks: `segment_info`
//! (provenance and absolute placement), `audio_analysis` (feature series,
//! relative frame) and `transcription` (dual-frame word timings). The
//! document is the hand-off format between pipeline stages, so loading
//! re-runs full record validation instead of trusting the file.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use super::{SegmentRecord, WaveformRegion};
use crate::error::{DubError, Result};
use crate::features::{EnergyPoint, FeatureSeries, PitchPoint, SilenceGap};
use crate::transcript::{PhraseSpan, TimeSpan, WordSpan};

/// Root of the persisted analysis document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDocument {
    pub segment_info: SegmentInfo,
    pub audio_analysis: AudioAnalysis,
    pub transcription: TranscriptionBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// The original full recording.
    pub source_file: PathBuf,
    /// The extracted mono region audio, next to this document.
    pub extracted_segment: PathBuf,
    /// Placement of the region within the source file.
    pub time_range_absolute: TimeSpan,
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Replacement lyric lines, one per chunk. Written back by the
    /// generation stage once it selects them; absent straight after
    /// analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_lyrics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub duration: f32,
    pub tempo_bpm: f32,
    pub beat_times_relative: Vec<f32>,
    pub onset_times_relative: Vec<f32>,
    pub pitch_contour: Vec<PitchPoint>,
    pub energy_series: Vec<EnergyPoint>,
    pub silence_gaps: Vec<SilenceGap>,
    pub summary: AnalysisSummary,
}

/// Redundant headline numbers for quick inspection of a document without
/// walking the series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub word_count: usize,
    pub onset_count: usize,
    pub beat_count: usize,
    pub silence_gap_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_pitch_hz: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_energy_db: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionBlock {
    pub full_text: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Word spans with both `time_relative` and `time_absolute` frames.
    #[serde(rename = "word_timings_dual_frame")]
    pub word_timings: Vec<WordSpan>,
    #[serde(default)]
    pub segments: Vec<PhraseSpan>,
}

impl SegmentDocument {
    pub fn from_record(
        record: &SegmentRecord,
        extracted_segment: impl Into<PathBuf>,
        segments: Vec<PhraseSpan>,
    ) -> Self {
        let features = &record.features;
        let mean = |values: Vec<f32>| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f32>() / values.len() as f32)
            }
        };

        Self {
            segment_info: SegmentInfo {
                source_file: record.region.source_path.clone(),
                extracted_segment: extracted_segment.into(),
                time_range_absolute: TimeSpan::new(
                    record.region.absolute_start,
                    record.region.absolute_end,
                ),
                sample_rate: record.region.sample_rate,
                channel_count: record.region.channel_count,
                target_lyrics: None,
            },
            audio_analysis: AudioAnalysis {
                duration: record.region.duration(),
                tempo_bpm: features.tempo_bpm,
                beat_times_relative: features.beat_times.clone(),
                onset_times_relative: features.onset_times.clone(),
                pitch_contour: features.pitch_contour.clone(),
                energy_series: features.energy_series.clone(),
                silence_gaps: record.silence_gaps.clone(),
                summary: AnalysisSummary {
                    word_count: record.words.len(),
                    onset_count: features.onset_times.len(),
                    beat_count: features.beat_times.len(),
                    silence_gap_count: record.silence_gaps.len(),
                    mean_pitch_hz: mean(
                        features.pitch_contour.iter().map(|p| p.pitch_hz).collect(),
                    ),
                    mean_energy_db: mean(
                        features.energy_series.iter().map(|e| e.energy_db).collect(),
                    ),
                },
            },
            transcription: TranscriptionBlock {
                full_text: record.full_text.clone(),
                language: record.detected_language.clone(),
                word_timings: record.words.clone(),
                segments,
            },
        }
    }

    /// Rebuilds a validated [`SegmentRecord`] from the document.
    pub fn to_record(&self) -> Result<SegmentRecord> {
        let info = &self.segment_info;
        let region = WaveformRegion::new(
            info.source_file.clone(),
            info.time_range_absolute.start,
            info.time_range_absolute.end,
            info.sample_rate,
        )?;

        let features = FeatureSeries {
            tempo_bpm: self.audio_analysis.tempo_bpm,
            beat_times: self.audio_analysis.beat_times_relative.clone(),
            onset_times: self.audio_analysis.onset_times_relative.clone(),
            pitch_contour: self.audio_analysis.pitch_contour.clone(),
            energy_series: self.audio_analysis.energy_series.clone(),
        };

        SegmentRecord::new(
            region,
            features,
            self.transcription.word_timings.clone(),
            self.transcription.full_text.clone(),
            self.transcription.language.clone(),
            self.audio_analysis.silence_gaps.clone(),
        )
    }
}

/// Writes the document as pretty-printed JSON.
pub fn save_document(document: &SegmentDocument, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(path, json)?;
    info!("saved segment document to {}", path.display());
    Ok(())
}

/// Loads a document and checks it still describes a valid record.
pub fn load_document(path: &Path) -> Result<SegmentDocument> {
    if !path.exists() {
        return Err(DubError::MissingArtifact(path.to_path_buf()));
    }
    let json = std::fs::read_to_string(path)?;
    let document: SegmentDocument = serde_json::from_str(&json)?;
    document.to_record()?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::tests::record_with_words;

    fn document() -> SegmentDocument {
        let mut record = record_with_words(93.2, &[(0.0, 0.45), (0.5, 1.02), (1.1, 1.83)]);
        record.features.tempo_bpm = 117.5;
        record.features.onset_times = vec![0.01, 0.52, 1.08];
        record.silence_gaps = vec![SilenceGap { start: 1.9, end: 2.2, duration: 0.3 }];
        SegmentDocument::from_record(&record, "segment.wav", Vec::new())
    }

    #[test]
    fn document_groups_and_summary() {
        let doc = document();
        assert_eq!(doc.segment_info.extracted_segment, PathBuf::from("segment.wav"));
        assert!((doc.segment_info.time_range_absolute.start - 93.2).abs() < 1e-6);
        assert_eq!(doc.audio_analysis.summary.word_count, 3);
        assert_eq!(doc.audio_analysis.summary.onset_count, 3);
        assert_eq!(doc.audio_analysis.summary.silence_gap_count, 1);
        assert_eq!(doc.transcription.word_timings.len(), 3);
    }

    #[test]
    fn json_round_trip_preserves_dual_frame_times() {
        let doc = document();
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let loaded: SegmentDocument = serde_json::from_str(&json).unwrap();

        for (a, b) in doc
            .transcription
            .word_timings
            .iter()
            .zip(&loaded.transcription.word_timings)
        {
            assert_eq!(a.relative, b.relative);
            assert_eq!(a.absolute, b.absolute);
            assert_eq!(a.text, b.text);
        }
        assert_eq!(doc.audio_analysis.tempo_bpm, loaded.audio_analysis.tempo_bpm);

        // Rebuilt record passes full validation.
        loaded.to_record().unwrap();
    }

    #[test]
    fn serialized_words_use_dual_frame_keys() {
        let doc = document();
        let value = serde_json::to_value(&doc).unwrap();
        let word = &value["transcription"]["word_timings_dual_frame"][0];
        assert!(word["time_relative"]["start"].is_number());
        assert!(word["time_absolute"]["start"].is_number());
        assert!(word["word"].is_string());
    }

    #[test]
    fn target_lyrics_survive_round_trip() {
        let mut doc = document();
        assert!(doc.segment_info.target_lyrics.is_none());

        doc.segment_info.target_lyrics =
            Some(vec!["toma mi mano".to_string(), "vamos a cantar".to_string()]);
        let json = serde_json::to_string(&doc).unwrap();
        let loaded: SegmentDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.segment_info.target_lyrics, doc.segment_info.target_lyrics);
    }

    #[test]
    fn load_missing_file_is_fatal() {
        let err = load_document(Path::new("/nonexistent/analysis.json")).unwrap_err();
        assert!(matches!(err, DubError::MissingArtifact(_)));
    }

    #[test]
    fn save_and_load_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        let doc = document();
        save_document(&doc, &path).unwrap();

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded.transcription.full_text, doc.transcription.full_text);
        assert_eq!(
            loaded.transcription.word_timings.len(),
            doc.transcription.word_timings.len()
        );
    }
}
