//! Splits a segment's word list into line-sized chunks for synthesis.
//!
//! The partition is remainder-first: with `total` words and `k` chunks,
//! the first `total % k` chunks get one extra word, so 18 words over 4
//! chunks come out as 5, 5, 4, 4. The same inputs always yield the same
//! partition.

use log::warn;

use super::SegmentRecord;
use crate::config::PipelineConfig;
use crate::error::{DubError, Result};

/// One synthesis unit: a run of consecutive words plus its padded audio
/// excerpt and the lyric line that will replace it.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based position within the segment.
    pub line_number: usize,
    /// Inclusive word index range covered by this chunk.
    pub word_index_range: (usize, usize),
    /// Relative bounds taken verbatim from the boundary words, unpadded.
    pub relative_start: f32,
    pub relative_end: f32,
    /// Original words joined by spaces.
    pub source_text: String,
    /// Replacement lyric line.
    pub target_text: String,
    /// Mono samples covering the padded chunk interval.
    pub audio_clip: Vec<f32>,
    /// Duration of `audio_clip` in seconds, including padding.
    pub clip_duration: f32,
    /// Duration of the synthesized replacement, set after synthesis.
    pub generated_duration: Option<f32>,
}

impl Chunk {
    /// Duration the synthesized replacement must ultimately occupy.
    pub fn target_duration(&self) -> f32 {
        self.relative_end - self.relative_start
    }

    /// Generated over target duration; `None` until synthesis succeeds.
    pub fn duration_ratio(&self) -> Option<f32> {
        self.generated_duration.map(|g| g / self.target_duration())
    }
}

/// The chunking outcome: chunks in order plus any degradation notes that
/// were logged along the way.
#[derive(Debug)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<String>,
}

/// Inclusive word index ranges for a remainder-first `k`-way split of
/// `total` words. Yields fewer than `k` ranges when there are not enough
/// words to give every chunk at least one.
pub fn partition_words(total: usize, k: usize) -> Vec<(usize, usize)> {
    if total == 0 || k == 0 {
        return Vec::new();
    }
    let base = total / k;
    let remainder = total % k;

    let mut ranges = Vec::with_capacity(k.min(total));
    let mut next = 0;
    for i in 0..k {
        let size = if i < remainder { base + 1 } else { base };
        if size == 0 {
            break;
        }
        ranges.push((next, next + size - 1));
        next += size;
    }
    ranges
}

/// Builds the chunk plan for a record. `samples` is the region's mono
/// audio and `target_lines` the replacement lyrics, one line per chunk.
pub fn chunk_record(
    record: &SegmentRecord,
    samples: &[f32],
    target_lines: &[String],
    config: &PipelineConfig,
) -> Result<ChunkPlan> {
    if record.words.is_empty() {
        return Err(DubError::DataIntegrity(
            "cannot chunk a record with no word timings".into(),
        ));
    }

    let mut warnings = Vec::new();
    let ranges = partition_words(record.words.len(), config.chunk_count);
    if ranges.len() < config.chunk_count {
        let note = format!(
            "only {} words for {} chunks; producing {} chunks",
            record.words.len(),
            config.chunk_count,
            ranges.len()
        );
        warn!("{note}");
        warnings.push(note);
    }
    if target_lines.len() != ranges.len() {
        let note = format!(
            "{} target lines for {} chunks; padding or truncating",
            target_lines.len(),
            ranges.len()
        );
        warn!("{note}");
        warnings.push(note);
    }

    let sample_rate = record.region.sample_rate as f32;
    let region_duration = record.region.duration();
    let padding = config.padding_secs();

    let chunks = ranges
        .iter()
        .enumerate()
        .map(|(i, &(first, last))| {
            let relative_start = record.words[first].relative.start;
            let relative_end = record.words[last].relative.end;

            let padded_start = (relative_start - padding).max(0.0);
            let padded_end = (relative_end + padding).min(region_duration);
            let from = (padded_start * sample_rate).round() as usize;
            let to = ((padded_end * sample_rate).round() as usize).min(samples.len());
            let audio_clip = samples[from.min(to)..to].to_vec();

            Chunk {
                line_number: i + 1,
                word_index_range: (first, last),
                relative_start,
                relative_end,
                source_text: record.words[first..=last]
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                target_text: target_lines.get(i).cloned().unwrap_or_default(),
                clip_duration: audio_clip.len() as f32 / sample_rate,
                audio_clip,
                generated_duration: None,
            }
        })
        .collect();

    Ok(ChunkPlan { chunks, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::tests::record_with_words;

    #[test]
    fn partition_is_remainder_first() {
        assert_eq!(partition_words(18, 4), vec![(0, 4), (5, 9), (10, 13), (14, 17)]);
        assert_eq!(partition_words(8, 4), vec![(0, 1), (2, 3), (4, 5), (6, 7)]);
        assert_eq!(partition_words(7, 4), vec![(0, 1), (2, 3), (4, 5), (6, 6)]);
        assert_eq!(partition_words(1, 4), vec![(0, 0)]);
        assert_eq!(partition_words(0, 4), vec![]);
    }

    #[test]
    fn partition_is_idempotent() {
        assert_eq!(partition_words(18, 4), partition_words(18, 4));
        assert_eq!(partition_words(5, 3), partition_words(5, 3));
    }

    #[test]
    fn partition_covers_all_words_contiguously() {
        for total in 1..40 {
            let ranges = partition_words(total, 4);
            assert_eq!(ranges[0].0, 0);
            for pair in ranges.windows(2) {
                assert_eq!(pair[1].0, pair[0].1 + 1);
            }
            assert_eq!(ranges.last().unwrap().1, total - 1);
        }
    }

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn chunk_bounds_come_verbatim_from_boundary_words() {
        let record = record_with_words(
            10.0,
            &[(0.0, 0.4), (0.5, 1.0), (1.1, 1.8), (2.0, 2.5), (2.6, 3.0)],
        );
        let samples = vec![0.0f32; (record.region.duration() * 44_100.0) as usize];
        let plan =
            chunk_record(&record, &samples, &lines(4), &PipelineConfig::default()).unwrap();

        assert_eq!(plan.chunks.len(), 4);
        // 5 words, 4 chunks: sizes 2, 1, 1, 1.
        let first = &plan.chunks[0];
        assert_eq!(first.word_index_range, (0, 1));
        assert_eq!(first.relative_start, 0.0);
        assert_eq!(first.relative_end, 1.0);
        assert_eq!(first.source_text, "w0 w1");
        assert_eq!(first.target_text, "line 0");
        assert_eq!(plan.chunks[3].word_index_range, (4, 4));
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn padding_extends_clip_but_not_target_duration() {
        let record = record_with_words(0.0, &[(0.2, 0.6), (0.7, 1.2), (1.3, 1.9), (2.0, 2.4)]);
        let samples = vec![0.0f32; (record.region.duration() * 44_100.0) as usize];
        let config = PipelineConfig::default();
        let plan = chunk_record(&record, &samples, &lines(4), &config).unwrap();

        let chunk = &plan.chunks[0];
        assert!((chunk.target_duration() - 0.4).abs() < 1e-6);
        // 50 ms of padding on each side.
        assert!((chunk.clip_duration - 0.5).abs() < 2.0 / 44_100.0);
    }

    #[test]
    fn padding_clamps_at_region_edges() {
        let record = record_with_words(0.0, &[(0.0, 0.3), (0.4, 0.8), (0.9, 1.2), (1.3, 1.6)]);
        // Region ends 1.0 s after the last word.
        let samples = vec![0.0f32; (record.region.duration() * 44_100.0) as usize];
        let plan =
            chunk_record(&record, &samples, &lines(4), &PipelineConfig::default()).unwrap();

        // First chunk starts at word 0.0; padding cannot go below zero.
        assert!(!plan.chunks[0].audio_clip.is_empty());
        assert!((plan.chunks[0].clip_duration - 0.35).abs() < 2.0 / 44_100.0);
    }

    #[test]
    fn short_word_list_degrades_with_warning() {
        let record = record_with_words(0.0, &[(0.0, 0.4), (0.5, 1.0)]);
        let samples = vec![0.0f32; (record.region.duration() * 44_100.0) as usize];
        let plan =
            chunk_record(&record, &samples, &lines(4), &PipelineConfig::default()).unwrap();

        assert_eq!(plan.chunks.len(), 2);
        assert_eq!(plan.warnings.len(), 2);
    }

    #[test]
    fn mismatched_lyric_count_pads_with_empty_lines() {
        let record = record_with_words(0.0, &[(0.0, 0.4), (0.5, 1.0), (1.1, 1.5), (1.6, 2.0)]);
        let samples = vec![0.0f32; (record.region.duration() * 44_100.0) as usize];
        let plan =
            chunk_record(&record, &samples, &lines(2), &PipelineConfig::default()).unwrap();

        assert_eq!(plan.chunks.len(), 4);
        assert_eq!(plan.chunks[1].target_text, "line 1");
        assert_eq!(plan.chunks[2].target_text, "");
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn empty_record_is_an_error() {
        let record = record_with_words(0.0, &[(0.0, 0.4)]);
        let mut empty = record.clone();
        empty.words.clear();
        empty.full_text.clear();
        assert!(chunk_record(&empty, &[], &lines(4), &PipelineConfig::default()).is_err());
    }
}
