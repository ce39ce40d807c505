//! WAV decoding and encoding.
//!
//! The pipeline works on mono f32 PCM in memory and persists mono 16-bit
//! PCM WAV files. Multi-channel input is folded to mono on decode; any
//! other container format is out of scope.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::info;

use crate::error::{DubError, Result};

/// Duration in seconds for a sample count at a given rate.
pub fn duration_in_seconds(sample_count: usize, sample_rate: u32) -> f32 {
    sample_count as f32 / sample_rate as f32
}

/// Decodes a WAV file into mono f32 samples in [-1.0, 1.0].
///
/// Supports 16/24/32-bit integer and 32-bit float WAV. Multi-channel
/// audio is averaged into a single channel.
pub fn decode_wav_file<P: AsRef<Path>>(file_path: P) -> Result<(Vec<f32>, u32)> {
    let path = file_path.as_ref();
    let reader = WavReader::open(path).map_err(DubError::WavDecoding)?;
    let (mono, sample_rate, channels) = decode_reader(reader)?;

    info!(
        "decoded {} ({} samples, {} Hz, {} channel(s))",
        path.display(),
        mono.len(),
        sample_rate,
        channels
    );
    Ok((mono, sample_rate))
}

/// Decodes in-memory WAV bytes, as returned by the synthesis engine.
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let reader =
        WavReader::new(std::io::Cursor::new(bytes)).map_err(DubError::WavDecoding)?;
    let (mono, sample_rate, _) = decode_reader(reader)?;
    Ok((mono, sample_rate))
}

fn decode_reader<R: std::io::Read>(mut reader: WavReader<R>) -> Result<(Vec<f32>, u32, usize)> {
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;

    let pcm_data: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0).map_err(DubError::WavDecoding))
            .collect::<Result<_>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0).map_err(DubError::WavDecoding))
            .collect::<Result<_>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2_147_483_648.0).map_err(DubError::WavDecoding))
            .collect::<Result<_>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map_err(DubError::WavDecoding))
            .collect::<Result<_>>()?,
        (format, bits) => {
            return Err(DubError::AudioProcessing(format!(
                "unsupported WAV format: {format:?}, {bits} bit"
            )));
        }
    };

    let channels = spec.channels as usize;
    let mono = fold_to_mono(&pcm_data, channels);
    Ok((mono, sample_rate, channels))
}

/// Averages interleaved multi-channel samples into one channel.
pub fn fold_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Encodes mono f32 samples to a 16-bit PCM WAV file.
pub fn encode_wav<P: AsRef<Path>>(samples: &[f32], sample_rate: u32, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0).round() as i16)?;
    }
    writer.finalize()?;

    info!(
        "wrote {} ({} samples, {} Hz)",
        path.display(),
        samples.len(),
        sample_rate
    );
    Ok(())
}

/// Encodes mono f32 samples to 16-bit PCM WAV bytes in memory. Used for
/// multipart uploads that never touch disk.
pub fn encode_wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0).round() as i16)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Extracts the samples covering `[start_secs, end_secs)`, clamped to the
/// available audio.
pub fn slice_seconds(samples: &[f32], sample_rate: u32, start_secs: f32, end_secs: f32) -> Vec<f32> {
    let start = ((start_secs.max(0.0) * sample_rate as f32) as usize).min(samples.len());
    let end = ((end_secs.max(0.0) * sample_rate as f32) as usize).min(samples.len());
    if end <= start {
        return Vec::new();
    }
    samples[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn duration_calculation() {
        assert_eq!(duration_in_seconds(44_100, 44_100), 1.0);
        assert_eq!(duration_in_seconds(22_050, 44_100), 0.5);
        assert_eq!(duration_in_seconds(0, 44_100), 0.0);
    }

    #[test]
    fn fold_stereo_to_mono() {
        let stereo = vec![0.5, -0.5, 1.0, 0.0];
        let mono = fold_to_mono(&stereo, 2);
        assert_eq!(mono, vec![0.0, 0.5]);
    }

    #[test]
    fn wav_encode_decode_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let sample_rate = 44_100;
        let num_samples = 4410; // 100 ms
        let samples: Vec<f32> = (0..num_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5
            })
            .collect();

        encode_wav(&samples, sample_rate, &path).unwrap();
        let (decoded, decoded_rate) = decode_wav_file(&path).unwrap();

        assert_eq!(decoded_rate, sample_rate);
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(decoded.iter()) {
            // 16-bit quantization error bound
            assert!((a - b).abs() < 1.0 / 32000.0);
        }
    }

    #[test]
    fn in_memory_bytes_round_trip() {
        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 * 0.01).sin() * 0.4).collect();
        let bytes = encode_wav_bytes(&samples, 16_000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let (decoded, rate) = decode_wav_bytes(&bytes).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1.0 / 32000.0);
        }
    }

    #[test]
    fn slice_clamps_to_bounds() {
        let samples = vec![0.0; 1000];
        assert_eq!(slice_seconds(&samples, 1000, 0.2, 0.5).len(), 300);
        assert_eq!(slice_seconds(&samples, 1000, 0.9, 2.0).len(), 100);
        assert!(slice_seconds(&samples, 1000, 0.5, 0.2).is_empty());
    }
}
