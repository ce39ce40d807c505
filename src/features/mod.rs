//! Acoustic feature series derived from a waveform region.
//!
//! All timestamps are relative to the region's own start (time 0 = region
//! start). Pitch and energy frames are derived from the same hop length so
//! they can be joined by closed-interval range lookup.

pub mod extractor;

use serde::{Deserialize, Serialize};

use crate::error::{DubError, Result};

/// Analysis hop length in samples. Shared by the pitch and energy series.
pub const HOP_LENGTH: usize = 512;

/// FFT window size for spectral analysis.
pub const FFT_SIZE: usize = 2048;

/// One voiced pitch estimate. Frames with a non-positive estimate are
/// omitted from the contour, not zero-filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchPoint {
    pub time_relative: f32,
    pub pitch_hz: f32,
}

/// One frame of RMS energy in decibels relative to the loudest frame of
/// the same region (values ≤ 0 dB).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyPoint {
    pub time_relative: f32,
    pub energy_db: f32,
}

/// A run of low-energy frames classified as silence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceGap {
    pub start: f32,
    pub end: f32,
    pub duration: f32,
}

/// Time-indexed acoustic measurements for one region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSeries {
    /// Single dominant tempo estimate; 0.0 when no rhythm was detected.
    pub tempo_bpm: f32,
    pub beat_times: Vec<f32>,
    pub onset_times: Vec<f32>,
    pub pitch_contour: Vec<PitchPoint>,
    pub energy_series: Vec<EnergyPoint>,
}

impl FeatureSeries {
    /// Checks the ordering invariants: every time sequence must be
    /// monotonically non-decreasing and every pitch sample voiced.
    pub fn validate(&self) -> Result<()> {
        for (name, times) in [("beat_times", &self.beat_times), ("onset_times", &self.onset_times)]
        {
            if times.windows(2).any(|w| w[1] < w[0]) {
                return Err(DubError::DataIntegrity(format!("{name} not sorted")));
            }
        }
        if self
            .pitch_contour
            .windows(2)
            .any(|w| w[1].time_relative < w[0].time_relative)
        {
            return Err(DubError::DataIntegrity("pitch_contour not sorted".into()));
        }
        if self
            .energy_series
            .windows(2)
            .any(|w| w[1].time_relative < w[0].time_relative)
        {
            return Err(DubError::DataIntegrity("energy_series not sorted".into()));
        }
        if self.pitch_contour.iter().any(|p| p.pitch_hz <= 0.0) {
            return Err(DubError::DataIntegrity("unvoiced sample in pitch_contour".into()));
        }
        Ok(())
    }

    /// Pitch samples whose timestamp falls inside `[start, end]`.
    pub fn pitch_in_range(&self, start: f32, end: f32) -> impl Iterator<Item = f32> + '_ {
        self.pitch_contour
            .iter()
            .filter(move |p| p.time_relative >= start && p.time_relative <= end)
            .map(|p| p.pitch_hz)
    }

    /// Energy samples whose timestamp falls inside `[start, end]`.
    pub fn energy_in_range(&self, start: f32, end: f32) -> impl Iterator<Item = f32> + '_ {
        self.energy_series
            .iter()
            .filter(move |e| e.time_relative >= start && e.time_relative <= end)
            .map(|e| e.energy_db)
    }

    /// Drops all measurements past `cutoff` seconds. Used when a record is
    /// trimmed at a word boundary.
    pub fn truncated_at(&self, cutoff: f32) -> Self {
        Self {
            tempo_bpm: self.tempo_bpm,
            beat_times: self.beat_times.iter().copied().filter(|&t| t <= cutoff).collect(),
            onset_times: self.onset_times.iter().copied().filter(|&t| t <= cutoff).collect(),
            pitch_contour: self
                .pitch_contour
                .iter()
                .copied()
                .filter(|p| p.time_relative <= cutoff)
                .collect(),
            energy_series: self
                .energy_series
                .iter()
                .copied()
                .filter(|e| e.time_relative <= cutoff)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> FeatureSeries {
        FeatureSeries {
            tempo_bpm: 120.0,
            beat_times: vec![0.5, 1.0, 1.5],
            onset_times: vec![0.1, 0.6, 1.1],
            pitch_contour: vec![
                PitchPoint { time_relative: 0.1, pitch_hz: 220.0 },
                PitchPoint { time_relative: 0.2, pitch_hz: 230.0 },
                PitchPoint { time_relative: 1.2, pitch_hz: 240.0 },
            ],
            energy_series: vec![
                EnergyPoint { time_relative: 0.0, energy_db: -20.0 },
                EnergyPoint { time_relative: 0.1, energy_db: -10.0 },
                EnergyPoint { time_relative: 0.2, energy_db: 0.0 },
            ],
        }
    }

    #[test]
    fn validate_accepts_sorted_series() {
        assert!(series().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unvoiced_pitch() {
        let mut s = series();
        s.pitch_contour.push(PitchPoint { time_relative: 1.3, pitch_hz: 0.0 });
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_unsorted_onsets() {
        let mut s = series();
        s.onset_times = vec![0.5, 0.2];
        assert!(s.validate().is_err());
    }

    #[test]
    fn range_lookup_is_closed_interval() {
        let s = series();
        let pitches: Vec<f32> = s.pitch_in_range(0.1, 0.2).collect();
        assert_eq!(pitches, vec![220.0, 230.0]);
        assert_eq!(s.pitch_in_range(0.3, 0.5).count(), 0);
    }

    #[test]
    fn truncation_drops_later_samples() {
        let t = series().truncated_at(0.6);
        assert_eq!(t.beat_times, vec![0.5]);
        assert_eq!(t.onset_times, vec![0.1, 0.6]);
        assert_eq!(t.pitch_contour.len(), 2);
        assert_eq!(t.tempo_bpm, 120.0);
    }
}
