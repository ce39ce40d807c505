//! Sample-level audio processing: resampling, overlay mixing, gain, fades.

use std::cmp;

use log::info;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{DubError, Result};

/// Root-mean-square amplitude of a sample slice.
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Converts a gain in decibels to a linear amplitude factor.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Resamples mono audio by `ratio` (output length ≈ input length × ratio).
///
/// Processes the input in blocks sized to its duration. Used both for
/// playback-rate changes (resample, then keep the original clock rate so
/// the wall-clock duration scales by `ratio`) and for converting reference
/// prompts to the synthesis engine's sample rate.
pub fn resample_by_ratio(input: &[f32], ratio: f64, sample_rate: u32) -> Result<Vec<f32>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let duration_seconds = input.len() as f32 / sample_rate as f32;
    let block_size = if duration_seconds < 0.1 {
        64
    } else if duration_seconds < 0.5 {
        128
    } else if duration_seconds < 2.0 {
        256
    } else {
        512
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, block_size, 1)
        .map_err(|e| DubError::TimeStretching(format!("resampler init failed: {e}")))?;

    let output_size = (input.len() as f64 * ratio) as usize;
    let mut output_buf = vec![0.0; output_size + block_size * 2];
    let mut total_output = 0;

    let mut idx = 0;
    while idx < input.len() {
        let chunk_size = cmp::min(block_size, input.len() - idx);
        if chunk_size == 0 {
            break;
        }

        // Pad the trailing partial block so the fixed-input resampler
        // accepts it.
        let current_chunk = if chunk_size < block_size {
            let mut padded = vec![0.0; block_size];
            padded[..chunk_size].copy_from_slice(&input[idx..idx + chunk_size]);
            padded
        } else {
            input[idx..idx + chunk_size].to_vec()
        };

        let frames = vec![current_chunk];
        let output_frames = resampler
            .process(&frames, None)
            .map_err(|e| DubError::TimeStretching(format!("resampling failed: {e}")))?;

        let output_len = output_frames[0].len();
        if total_output + output_len > output_buf.len() {
            return Err(DubError::TimeStretching(format!(
                "output buffer overflow during resampling: {} + {} > {}",
                total_output,
                output_len,
                output_buf.len()
            )));
        }
        output_buf[total_output..total_output + output_len].copy_from_slice(&output_frames[0]);
        total_output += output_len;

        idx += chunk_size;
    }

    output_buf.truncate(total_output.min(output_size));
    Ok(output_buf)
}

/// Resamples audio from one clock rate to another.
pub fn resample_to_rate(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(input.to_vec());
    }
    resample_by_ratio(input, to_rate as f64 / from_rate as f64, from_rate)
}

/// Additively mixes `clip` into `master` starting at `position` samples.
///
/// The master track's length is authoritative: a clip overhanging the end
/// is truncated, never extends the track. A clip positioned past the end
/// is dropped entirely.
pub fn overlay_at(master: &mut [f32], clip: &[f32], position: usize) {
    if position >= master.len() {
        return;
    }
    let span = cmp::min(clip.len(), master.len() - position);
    for i in 0..span {
        master[position + i] += clip[i];
    }
}

/// Mixes two tracks with per-track gain in dB, padding the shorter one
/// with silence so neither is truncated.
pub fn mix_tracks(track1: &[f32], track2: &[f32], gain1_db: f32, gain2_db: f32) -> Vec<f32> {
    let gain1 = db_to_gain(gain1_db);
    let gain2 = db_to_gain(gain2_db);
    let len = cmp::max(track1.len(), track2.len());

    let mut mixed = Vec::with_capacity(len);
    for i in 0..len {
        let a = track1.get(i).copied().unwrap_or(0.0) * gain1;
        let b = track2.get(i).copied().unwrap_or(0.0) * gain2;
        mixed.push(a + b);
    }

    // Pull peaks back inside [-1, 1] if the sum clips.
    let max_amplitude = mixed.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
    if max_amplitude > 1.0 {
        let norm_factor = 0.95 / max_amplitude;
        for sample in &mut mixed {
            *sample *= norm_factor;
        }
        info!("mix normalized: peak {max_amplitude:.3}, factor {norm_factor:.3}");
    }

    mixed
}

/// Applies a linear fade in/out to remove clicks at clip boundaries.
/// Shortens the fade automatically for clips shorter than twice its span.
pub fn apply_fade(samples: &mut [f32], fade_ms: u32, sample_rate: u32) {
    if samples.is_empty() {
        return;
    }

    let mut fade_samples = ((fade_ms as f32 / 1000.0) * sample_rate as f32) as usize;
    if fade_samples * 2 >= samples.len() {
        fade_samples = samples.len() / 4;
    }
    if fade_samples == 0 {
        return;
    }

    for i in 0..fade_samples {
        let factor = i as f32 / fade_samples as f32;
        samples[i] *= factor;
        let idx = samples.len() - 1 - i;
        samples[idx] *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_known_signal() {
        let samples = vec![0.0, 0.5, -0.5, 1.0, -1.0];
        assert!((compute_rms(&samples) - 0.7071).abs() < 0.0001);
        assert_eq!(compute_rms(&[]), 0.0);
    }

    #[test]
    fn db_gain_reference_points() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-6.0) - 0.5012).abs() < 0.001);
    }

    #[test]
    fn overlay_truncates_tail() {
        let mut master = vec![0.0; 10];
        let clip = vec![1.0; 6];
        overlay_at(&mut master, &clip, 7);
        assert_eq!(master.len(), 10);
        assert_eq!(&master[7..], &[1.0, 1.0, 1.0]);
        assert_eq!(master[6], 0.0);
    }

    #[test]
    fn overlay_past_end_is_dropped() {
        let mut master = vec![0.0; 5];
        overlay_at(&mut master, &[1.0; 3], 9);
        assert!(master.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mix_pads_shorter_track() {
        let a = vec![0.5; 4];
        let b = vec![0.25; 8];
        let mixed = mix_tracks(&a, &b, 0.0, 0.0);
        assert_eq!(mixed.len(), 8);
        assert!((mixed[0] - 0.75).abs() < 1e-6);
        assert!((mixed[6] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn resample_halves_length() {
        let sample_rate = 8000;
        let input: Vec<f32> = (0..8000)
            .map(|i| (i as f32 / sample_rate as f32 * 220.0 * 2.0 * std::f32::consts::PI).sin())
            .collect();
        let output = resample_by_ratio(&input, 0.5, sample_rate).unwrap();
        let expected = input.len() / 2;
        let tolerance = expected / 10;
        assert!(
            output.len().abs_diff(expected) <= tolerance,
            "expected ≈{expected}, got {}",
            output.len()
        );
    }

    #[test]
    fn fade_tapers_edges() {
        let mut samples = vec![1.0; 1000];
        apply_fade(&mut samples, 100, 1000);
        assert!(samples[0] < 0.01);
        assert!(samples[500] > 0.99);
        assert!(samples[999] < 0.01);
    }
}
