//! Final track assembly.
//!
//! Synthesized parts are overlaid onto a silent master track at their
//! absolute positions. The master timeline mirrors the original
//! recording, so a segment that produced no audio simply leaves its span
//! silent; nothing downstream shifts to fill the hole.

use std::collections::HashMap;
use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::audio;
use crate::error::{DubError, Result};

/// Fade applied to each placed clip to remove boundary clicks.
const EDGE_FADE_MS: u32 = 10;

/// Gain applied to the instrumental bed relative to the vocals.
const INSTRUMENTAL_GAIN_DB: f32 = -2.0;

/// One part's position on the master timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePlacement {
    /// Stable name of the part, e.g. `part3`.
    pub part_identifier: String,
    pub absolute_start: f32,
    pub absolute_end: f32,
    /// Synthesized audio for this part. Ignored when `reused_from` names
    /// another part.
    pub source_audio_path: PathBuf,
    /// Identifier of an earlier part whose audio this part repeats, for
    /// choruses that recur verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reused_from: Option<String>,
}

impl TimelinePlacement {
    pub fn duration(&self) -> f32 {
        self.absolute_end - self.absolute_start
    }
}

/// Replaces each `reused_from` reference with the referenced part's audio
/// path. Reuse resolves before any audio is loaded, so a repeated chorus
/// is read once from disk per placement rather than re-synthesized.
pub fn resolve_reuse(placements: &[TimelinePlacement]) -> Result<Vec<(TimelinePlacement, PathBuf)>> {
    let by_id: HashMap<&str, &TimelinePlacement> = placements
        .iter()
        .map(|p| (p.part_identifier.as_str(), p))
        .collect();

    placements
        .iter()
        .map(|placement| {
            let path = match &placement.reused_from {
                None => placement.source_audio_path.clone(),
                Some(origin) => {
                    let original = by_id.get(origin.as_str()).ok_or_else(|| {
                        DubError::DataIntegrity(format!(
                            "part {} reuses unknown part {origin}",
                            placement.part_identifier
                        ))
                    })?;
                    if original.reused_from.is_some() {
                        return Err(DubError::DataIntegrity(format!(
                            "part {origin} is itself a reuse; chains are not allowed"
                        )));
                    }
                    info!(
                        "part {} reuses audio from part {origin}",
                        placement.part_identifier
                    );
                    original.source_audio_path.clone()
                }
            };
            Ok((placement.clone(), path))
        })
        .collect()
}

/// Overlays pre-loaded clips onto a silent master track.
///
/// The master spans from zero to the latest `absolute_end`; clips are
/// placed in start order and added, not concatenated, so gaps between
/// parts stay silent and a long clip never pushes its neighbors.
pub fn assemble_from_clips(
    mut clips: Vec<(TimelinePlacement, Vec<f32>)>,
    sample_rate: u32,
) -> Result<Vec<f32>> {
    if clips.is_empty() {
        return Err(DubError::DataIntegrity("no placements to assemble".into()));
    }
    for (placement, _) in &clips {
        if placement.absolute_end <= placement.absolute_start {
            return Err(DubError::DataIntegrity(format!(
                "part {} has non-positive duration",
                placement.part_identifier
            )));
        }
    }

    let total_end = clips
        .iter()
        .map(|(p, _)| p.absolute_end)
        .fold(0.0f32, f32::max);
    let mut master = vec![0.0f32; (total_end * sample_rate as f32).ceil() as usize];

    clips.sort_by(|(a, _), (b, _)| a.absolute_start.total_cmp(&b.absolute_start));
    for (placement, mut samples) in clips {
        if samples.is_empty() {
            warn!("part {} has no audio, span stays silent", placement.part_identifier);
            continue;
        }
        audio::apply_fade(&mut samples, EDGE_FADE_MS, sample_rate);
        let position = (placement.absolute_start * sample_rate as f32) as usize;
        audio::overlay_at(&mut master, &samples, position);
        info!(
            "placed part {} at {:.2}s ({:.2}s of audio)",
            placement.part_identifier,
            placement.absolute_start,
            audio::duration_in_seconds(samples.len(), sample_rate)
        );
    }

    Ok(master)
}

/// Loads every placement's audio from disk, resamples it to
/// `sample_rate`, and assembles the vocal master track.
pub fn assemble_track(placements: &[TimelinePlacement], sample_rate: u32) -> Result<Vec<f32>> {
    let resolved = resolve_reuse(placements)?;

    let mut clips = Vec::with_capacity(resolved.len());
    for (placement, path) in resolved {
        if !path.exists() {
            warn!(
                "part {}: {} is missing, span stays silent",
                placement.part_identifier,
                path.display()
            );
            clips.push((placement, Vec::new()));
            continue;
        }
        let (samples, rate) = audio::decode_wav_file(&path)?;
        let samples = audio::resample_to_rate(&samples, rate, sample_rate)?;
        clips.push((placement, samples));
    }

    assemble_from_clips(clips, sample_rate)
}

/// Mixes the assembled vocals over the instrumental bed, vocals at unity
/// gain and the instrumental pulled down.
pub fn mix_with_instrumental(vocals: &[f32], instrumental: &[f32]) -> Vec<f32> {
    audio::mix_tracks(vocals, instrumental, 0.0, INSTRUMENTAL_GAIN_DB)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(id: &str, start: f32, end: f32, reused_from: Option<&str>) -> TimelinePlacement {
        TimelinePlacement {
            part_identifier: id.to_string(),
            absolute_start: start,
            absolute_end: end,
            source_audio_path: PathBuf::from(format!("{id}.wav")),
            reused_from: reused_from.map(str::to_string),
        }
    }

    #[test]
    fn reuse_resolves_to_original_audio_path() {
        let placements = vec![
            placement("part1", 0.0, 2.0, None),
            placement("part5", 10.0, 12.0, Some("part1")),
        ];
        let resolved = resolve_reuse(&placements).unwrap();
        assert_eq!(resolved[0].1, PathBuf::from("part1.wav"));
        assert_eq!(resolved[1].1, PathBuf::from("part1.wav"));
    }

    #[test]
    fn reuse_of_unknown_or_chained_part_fails() {
        let unknown = vec![placement("part5", 0.0, 1.0, Some("part9"))];
        assert!(resolve_reuse(&unknown).is_err());

        let chained = vec![
            placement("part1", 0.0, 1.0, None),
            placement("part5", 2.0, 3.0, Some("part1")),
            placement("part6", 4.0, 5.0, Some("part5")),
        ];
        assert!(resolve_reuse(&chained).is_err());
    }

    #[test]
    fn master_spans_to_latest_end_with_silent_gaps() {
        let rate = 1000;
        let clips = vec![
            (placement("part1", 1.0, 2.0, None), vec![0.5f32; 1000]),
            (placement("part2", 4.0, 5.0, None), vec![0.5f32; 1000]),
        ];
        let master = assemble_from_clips(clips, rate).unwrap();

        assert_eq!(master.len(), 5000);
        // Leading silence, gap between parts, audio inside spans.
        assert!(master[..990].iter().all(|&s| s == 0.0));
        assert!(master[2100..3990].iter().all(|&s| s == 0.0));
        assert!(master[1500] > 0.4);
        assert!(master[4500] > 0.4);
    }

    #[test]
    fn overlong_clip_does_not_push_neighbors() {
        let rate = 1000;
        let clips = vec![
            (placement("part1", 0.0, 1.0, None), vec![0.3f32; 2500]),
            (placement("part2", 3.0, 4.0, None), vec![0.3f32; 1000]),
        ];
        let master = assemble_from_clips(clips, rate).unwrap();

        assert_eq!(master.len(), 4000);
        // part2 still starts at its absolute position.
        assert!(master[3500] > 0.2);
        // The overhang bleeds past 1.0 s but part2's slot is unmoved.
        assert!(master[2000] > 0.2);
    }

    #[test]
    fn empty_part_leaves_silence() {
        let rate = 1000;
        let clips = vec![
            (placement("part1", 0.0, 1.0, None), vec![0.5f32; 1000]),
            (placement("part2", 2.0, 3.0, None), Vec::new()),
        ];
        let master = assemble_from_clips(clips, rate).unwrap();
        assert!(master[2000..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn invalid_placement_is_rejected() {
        let clips = vec![(placement("part1", 2.0, 2.0, None), vec![0.1f32; 100])];
        assert!(assemble_from_clips(clips, 1000).is_err());
        assert!(assemble_from_clips(Vec::new(), 1000).is_err());
    }

    #[test]
    fn assemble_from_disk_resolves_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let rate = 8000;
        let part1 = dir.path().join("part1.wav");
        audio::encode_wav(&vec![0.5f32; 8000], rate, &part1).unwrap();

        let placements = vec![
            TimelinePlacement {
                part_identifier: "part1".to_string(),
                absolute_start: 0.0,
                absolute_end: 1.0,
                source_audio_path: part1.clone(),
                reused_from: None,
            },
            TimelinePlacement {
                part_identifier: "part5".to_string(),
                absolute_start: 2.0,
                absolute_end: 3.0,
                source_audio_path: dir.path().join("part5.wav"),
                reused_from: Some("part1".to_string()),
            },
        ];

        let master = assemble_track(&placements, rate).unwrap();
        assert_eq!(master.len(), 3 * rate as usize);
        assert!(master[rate as usize / 2].abs() > 0.4);
        assert!(master[2 * rate as usize + rate as usize / 2].abs() > 0.4);
    }

    #[test]
    fn instrumental_sits_below_vocals() {
        let vocals = vec![0.5f32; 100];
        let instrumental = vec![0.5f32; 200];
        let mixed = mix_with_instrumental(&vocals, &instrumental);
        assert_eq!(mixed.len(), 200);
        // Tail carries only the attenuated instrumental.
        assert!((mixed[150] - 0.5 * audio::db_to_gain(-2.0)).abs() < 1e-4);
        assert!(mixed[50] > mixed[150]);
    }
}
