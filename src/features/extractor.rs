//! Feature Extractor: tempo, beats, onsets, pitch contour and frame
//! energy for a mono waveform.
//!
//! Onset detection uses a fixed, symmetric parameterization (±1 frame for
//! both the averaging and maxima windows, 1-frame wait) so the same input
//! always yields the same onset set; onset times are later used as an
//! alignment oracle for transcribed word boundaries. On empty or
//! near-silent input every estimator degrades to an empty sequence rather
//! than failing.

use log::info;
use rustfft::{num_complex::Complex32, FftPlanner};

use super::{EnergyPoint, FeatureSeries, PitchPoint, SilenceGap, FFT_SIZE, HOP_LENGTH};

/// Pitch search band in Hz. Estimates outside it are treated as unvoiced.
const PITCH_MIN_HZ: f32 = 50.0;
const PITCH_MAX_HZ: f32 = 2000.0;

/// Tempo search band in BPM.
const TEMPO_MIN_BPM: f32 = 60.0;
const TEMPO_MAX_BPM: f32 = 180.0;

/// Normalized flux threshold for onset peak picking.
const ONSET_DELTA: f32 = 0.1;

/// Frames below this RMS percentile are classified as silent.
const SILENCE_PERCENTILE: f32 = 0.15;

/// Silent runs shorter than this are kept as part of the vocal line.
const MIN_GAP_SECS: f32 = 0.15;

/// Derives the full feature series for a mono waveform.
pub fn extract_features(samples: &[f32], sample_rate: u32) -> FeatureSeries {
    let magnitudes = stft_magnitudes(samples);
    let rms = frame_rms(samples);
    let frame_time = |i: usize| (i * HOP_LENGTH) as f32 / sample_rate as f32;

    let energy_series = energy_db_series(&rms, sample_rate);
    let pitch_contour = pitch_contour(&magnitudes, sample_rate);

    let flux = spectral_flux(&magnitudes);
    let onset_frames = pick_onset_peaks(&flux);
    let onset_times: Vec<f32> = onset_frames.iter().map(|&i| frame_time(i)).collect();

    let (tempo_bpm, beat_times) = track_tempo(&flux, &onset_frames, sample_rate);

    info!(
        "features: {} frames, tempo {:.1} BPM, {} beats, {} onsets, {} voiced pitch frames",
        rms.len(),
        tempo_bpm,
        beat_times.len(),
        onset_times.len(),
        pitch_contour.len()
    );

    FeatureSeries {
        tempo_bpm,
        beat_times,
        onset_times,
        pitch_contour,
        energy_series,
    }
}

/// Detects silent gaps from frame RMS: frames below the 15th energy
/// percentile, merged into runs, keeping only runs longer than 0.15 s.
pub fn detect_silence_gaps(samples: &[f32], sample_rate: u32) -> Vec<SilenceGap> {
    let rms = frame_rms(samples);
    if rms.is_empty() {
        return Vec::new();
    }

    let threshold = percentile(&rms, SILENCE_PERCENTILE);
    let frame_time = |i: usize| (i * HOP_LENGTH) as f32 / sample_rate as f32;

    let mut gaps = Vec::new();
    let mut gap_start: Option<usize> = None;

    for (i, &value) in rms.iter().enumerate() {
        // Inclusive so digital-zero frames count as silent even when the
        // threshold itself is zero, as in separated vocal stems.
        let silent = value <= threshold;
        match (silent, gap_start) {
            (true, None) => gap_start = Some(i),
            (false, Some(start)) => {
                let (s, e) = (frame_time(start), frame_time(i));
                if e - s > MIN_GAP_SECS {
                    gaps.push(SilenceGap { start: s, end: e, duration: e - s });
                }
                gap_start = None;
            }
            _ => {}
        }
    }

    gaps
}

/// Finds the first energetic region of a recording, used when the analyze
/// stage is given no explicit bounds. Active frames are those above the
/// 70th RMS percentile; the region starts at the first one and extends up
/// to `max_duration`, stretched to `min_duration` when activity is short.
pub fn detect_vocal_region(
    samples: &[f32],
    sample_rate: u32,
    min_duration: f32,
    max_duration: f32,
) -> (f32, f32) {
    let rms = frame_rms(samples);
    let total = samples.len() as f32 / sample_rate as f32;
    if rms.is_empty() {
        return (0.0, total.min(max_duration));
    }

    let threshold = percentile(&rms, 0.70);
    let frame_time = |i: usize| (i * HOP_LENGTH) as f32 / sample_rate as f32;

    let active: Vec<usize> = rms
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > threshold)
        .map(|(i, _)| i)
        .collect();

    let Some((&first, &last)) = active.first().zip(active.last()) else {
        return (0.0, total.min(max_duration));
    };

    let start = frame_time(first);
    let mut end = (start + max_duration).min(frame_time(last));
    if end - start < min_duration {
        end = (start + min_duration).min(total);
    }
    (start, end)
}

/// Hann-windowed STFT magnitude frames, one per hop.
fn stft_magnitudes(samples: &[f32]) -> Vec<Vec<f32>> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);
    let window: Vec<f32> = (0..FFT_SIZE)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect();

    let num_frames = samples.len().div_ceil(HOP_LENGTH);
    let mut frames = Vec::with_capacity(num_frames);
    let mut buffer = vec![Complex32::new(0.0, 0.0); FFT_SIZE];

    for frame_idx in 0..num_frames {
        let offset = frame_idx * HOP_LENGTH;
        for (i, slot) in buffer.iter_mut().enumerate() {
            let sample = samples.get(offset + i).copied().unwrap_or(0.0);
            *slot = Complex32::new(sample * window[i], 0.0);
        }
        fft.process(&mut buffer);

        let magnitude: Vec<f32> = buffer[..FFT_SIZE / 2 + 1].iter().map(|c| c.norm()).collect();
        frames.push(magnitude);
    }

    frames
}

/// Per-frame RMS over a hop-aligned window.
fn frame_rms(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let num_frames = samples.len().div_ceil(HOP_LENGTH);
    (0..num_frames)
        .map(|i| {
            let start = i * HOP_LENGTH;
            let end = (start + FFT_SIZE).min(samples.len());
            crate::audio::compute_rms(&samples[start..end])
        })
        .collect()
}

/// RMS frames converted to dB relative to the loudest frame, so values
/// are ≤ 0 and comparable within a region.
fn energy_db_series(rms: &[f32], sample_rate: u32) -> Vec<EnergyPoint> {
    let reference = rms.iter().fold(0.0f32, |a, &b| a.max(b));
    if reference <= 0.0 {
        return Vec::new();
    }
    rms.iter()
        .enumerate()
        .map(|(i, &value)| {
            // Floor at -100 dB to keep silent frames finite.
            let ratio = (value / reference).max(1e-5);
            EnergyPoint {
                time_relative: (i * HOP_LENGTH) as f32 / sample_rate as f32,
                energy_db: 20.0 * ratio.log10(),
            }
        })
        .collect()
}

/// Dominant-frequency pitch picking: the strongest magnitude bin inside
/// the pitch band, per frame. Frames whose peak is out of band or below
/// the noise floor are dropped, not clamped.
fn pitch_contour(magnitudes: &[Vec<f32>], sample_rate: u32) -> Vec<PitchPoint> {
    let bin_hz = sample_rate as f32 / FFT_SIZE as f32;
    let lo_bin = (PITCH_MIN_HZ / bin_hz).ceil() as usize;
    let hi_bin = ((PITCH_MAX_HZ / bin_hz).floor() as usize).min(FFT_SIZE / 2);

    let global_peak = magnitudes
        .iter()
        .flat_map(|m| m.iter().copied())
        .fold(0.0f32, f32::max);
    if global_peak <= 0.0 || lo_bin >= hi_bin {
        return Vec::new();
    }
    let floor = global_peak * 1e-3;

    magnitudes
        .iter()
        .enumerate()
        .filter_map(|(frame_idx, magnitude)| {
            let (best_bin, &best_mag) = magnitude[lo_bin..=hi_bin]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, m)| (i + lo_bin, m))?;
            if best_mag <= floor {
                return None;
            }
            Some(PitchPoint {
                time_relative: (frame_idx * HOP_LENGTH) as f32 / sample_rate as f32,
                pitch_hz: best_bin as f32 * bin_hz,
            })
        })
        .collect()
}

/// Half-wave rectified spectral flux, normalized to a peak of 1.
fn spectral_flux(magnitudes: &[Vec<f32>]) -> Vec<f32> {
    if magnitudes.len() < 2 {
        return vec![0.0; magnitudes.len()];
    }

    let mut flux = Vec::with_capacity(magnitudes.len());
    flux.push(0.0);
    for pair in magnitudes.windows(2) {
        let sum: f32 = pair[1]
            .iter()
            .zip(pair[0].iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        flux.push(sum);
    }

    let peak = flux.iter().fold(0.0f32, |a, &b| a.max(b));
    if peak > 0.0 {
        for value in &mut flux {
            *value /= peak;
        }
    }
    flux
}

/// Peak picking over the flux envelope with symmetric ±1-frame windows
/// and a 1-frame wait, giving a reproducible onset set.
fn pick_onset_peaks(flux: &[f32]) -> Vec<usize> {
    let mut onsets = Vec::new();
    let mut last_onset: Option<usize> = None;

    for i in 1..flux.len().saturating_sub(1) {
        let value = flux[i];
        let local_max = value >= flux[i - 1] && value >= flux[i + 1];
        let local_mean = (flux[i - 1] + value + flux[i + 1]) / 3.0;
        let waited = last_onset.map_or(true, |last| i - last > 1);

        if local_max && value >= local_mean + ONSET_DELTA && waited {
            onsets.push(i);
            last_onset = Some(i);
        }
    }
    onsets
}

/// Scalar tempo plus a beat grid. The beat period is the median
/// inter-onset interval, folded by octaves into the tempo band; the
/// median resists spurious and missed onsets, and folding keeps a
/// half- or double-time envelope from halving or doubling the estimate.
/// Always a single dominant value; 0.0 with an empty grid when fewer
/// than two onsets exist.
fn track_tempo(flux: &[f32], onset_frames: &[usize], sample_rate: u32) -> (f32, Vec<f32>) {
    let frame_rate = sample_rate as f32 / HOP_LENGTH as f32;
    if onset_frames.len() < 2 {
        return (0.0, Vec::new());
    }

    let mut intervals: Vec<usize> = onset_frames
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&d| d > 0)
        .collect();
    if intervals.is_empty() {
        return (0.0, Vec::new());
    }
    intervals.sort_unstable();
    let median = intervals[intervals.len() / 2] as f32;

    let mut tempo = 60.0 * frame_rate / median;
    // The band spans more than one octave, so folding always terminates
    // inside it.
    while tempo < TEMPO_MIN_BPM {
        tempo *= 2.0;
    }
    while tempo > TEMPO_MAX_BPM {
        tempo /= 2.0;
    }

    let period = (60.0 * frame_rate / tempo).round() as usize;
    if period == 0 || flux.len() <= period {
        return (tempo, Vec::new());
    }

    // Phase: the grid offset with the most envelope energy under it.
    let mut best_phase = 0;
    let mut best_energy = f32::NEG_INFINITY;
    for phase in 0..period {
        let energy: f32 = (phase..flux.len()).step_by(period).map(|i| flux[i]).sum();
        if energy > best_energy {
            best_energy = energy;
            best_phase = phase;
        }
    }

    let beat_times = (best_phase..flux.len())
        .step_by(period)
        .map(|i| (i * HOP_LENGTH) as f32 / sample_rate as f32)
        .collect();

    (tempo, beat_times)
}

/// Percentile by rank on a sorted copy (nearest-rank, deterministic).
fn percentile(values: &[f32], fraction: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let rank = ((sorted.len() - 1) as f32 * fraction).round() as usize;
    sorted[rank]
}
