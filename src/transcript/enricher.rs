//! Timing Enricher: joins word spans with feature series to attach
//! per-word pitch and energy aggregates.

use log::debug;

use super::WordSpan;
use crate::features::FeatureSeries;

/// Populates the pitch/energy fields of each word from every feature
/// sample whose timestamp falls inside the word's closed relative
/// interval. A word with no qualifying samples (typically shorter than
/// one hop) keeps `None` fields.
pub fn enrich_words(words: &mut [WordSpan], features: &FeatureSeries) {
    for word in words.iter_mut() {
        let start = word.relative.start;
        let end = word.relative.end;

        let pitches: Vec<f32> = features.pitch_in_range(start, end).collect();
        if !pitches.is_empty() {
            let sum: f32 = pitches.iter().sum();
            word.avg_pitch_hz = Some(sum / pitches.len() as f32);
            word.min_pitch_hz = pitches.iter().copied().reduce(f32::min);
            word.max_pitch_hz = pitches.iter().copied().reduce(f32::max);
        }

        let energies: Vec<f32> = features.energy_in_range(start, end).collect();
        if !energies.is_empty() {
            let sum: f32 = energies.iter().sum();
            word.avg_energy_db = Some(sum / energies.len() as f32);
            word.max_energy_db = energies.iter().copied().reduce(f32::max);
        }

        debug!(
            "'{}': pitch={:?} Hz, energy={:?} dB",
            word.text, word.avg_pitch_hz, word.avg_energy_db
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{EnergyPoint, PitchPoint};

    fn features() -> FeatureSeries {
        FeatureSeries {
            tempo_bpm: 100.0,
            beat_times: vec![],
            onset_times: vec![],
            pitch_contour: vec![
                PitchPoint { time_relative: 0.10, pitch_hz: 200.0 },
                PitchPoint { time_relative: 0.20, pitch_hz: 300.0 },
                PitchPoint { time_relative: 0.30, pitch_hz: 250.0 },
                PitchPoint { time_relative: 0.90, pitch_hz: 500.0 },
            ],
            energy_series: vec![
                EnergyPoint { time_relative: 0.10, energy_db: -12.0 },
                EnergyPoint { time_relative: 0.20, energy_db: -6.0 },
                EnergyPoint { time_relative: 0.90, energy_db: -30.0 },
            ],
        }
    }

    #[test]
    fn aggregates_over_closed_interval() {
        let mut words = vec![WordSpan::from_relative(0, "toma", 0.10, 0.30, 0.0)];
        enrich_words(&mut words, &features());

        let word = &words[0];
        assert!((word.avg_pitch_hz.unwrap() - 250.0).abs() < 1e-4);
        assert_eq!(word.min_pitch_hz, Some(200.0));
        assert_eq!(word.max_pitch_hz, Some(300.0));
        assert!((word.avg_energy_db.unwrap() - (-9.0)).abs() < 1e-4);
        assert_eq!(word.max_energy_db, Some(-6.0));
    }

    #[test]
    fn degenerate_word_keeps_null_fields() {
        // Shorter than one hop, between samples: no qualifying frames.
        let mut words = vec![WordSpan::from_relative(0, "eh", 0.40, 0.42, 0.0)];
        enrich_words(&mut words, &features());

        let word = &words[0];
        assert_eq!(word.avg_pitch_hz, None);
        assert_eq!(word.min_pitch_hz, None);
        assert_eq!(word.max_pitch_hz, None);
        assert_eq!(word.avg_energy_db, None);
        assert_eq!(word.max_energy_db, None);
    }
}
