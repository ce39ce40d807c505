//! HTTP adapter for the cross-lingual synthesis service.

use log::warn;

use super::{ReferencePrompt, SpeechSynthesizer, SynthesizedClip};
use crate::audio;
use crate::config::SynthesizerConfig;
use crate::error::{DubError, Result};

/// Sample rate of the engine's raw PCM stream when it does not wrap the
/// response in a WAV container.
const ENGINE_OUTPUT_RATE: u32 = 22_050;

/// Client for a CosyVoice-style inference endpoint. Each request uploads
/// the reference prompt as a WAV part alongside the target text.
pub struct CosyVoiceClient {
    client: reqwest::Client,
    config: SynthesizerConfig,
}

impl CosyVoiceClient {
    pub fn new(config: SynthesizerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn request(&self, text: &str, reference: &ReferencePrompt) -> Result<SynthesizedClip> {
        let prompt_bytes = audio::encode_wav_bytes(&reference.samples, reference.sample_rate)?;

        let part = reqwest::multipart::Part::bytes(prompt_bytes)
            .file_name("prompt.wav")
            .mime_str("audio/wav")
            .map_err(|e| DubError::Synthesis(format!("invalid mime type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("tts_text", text.to_string())
            .text("speed", self.config.speed.to_string())
            .part("prompt_wav", part);

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DubError::Synthesis(format!("engine returned {status}: {body}")));
        }

        let bytes = response.bytes().await?;
        decode_engine_audio(&bytes)
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for CosyVoiceClient {
    /// Synthesizes `text` in the reference voice; retries once on failure.
    async fn synthesize(
        &self,
        text: &str,
        reference: &ReferencePrompt,
    ) -> Result<SynthesizedClip> {
        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                warn!("synthesis request failed, retrying once");
            }
            match self.request(text, reference).await {
                Ok(clip) => return Ok(clip),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| DubError::Synthesis("request failed".into())))
    }
}

/// Decodes the engine response: a WAV container when present, otherwise a
/// raw little-endian 16-bit PCM stream at the engine's fixed rate.
fn decode_engine_audio(bytes: &[u8]) -> Result<SynthesizedClip> {
    if bytes.is_empty() {
        return Err(DubError::Synthesis("engine returned empty audio".into()));
    }

    if bytes.starts_with(b"RIFF") {
        let (samples, sample_rate) = audio::decode_wav_bytes(bytes)?;
        return Ok(SynthesizedClip { samples, sample_rate });
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    Ok(SynthesizedClip { samples, sample_rate: ENGINE_OUTPUT_RATE })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_response_is_decoded_with_its_own_rate() {
        let samples = vec![0.25f32; 1600];
        let bytes = audio::encode_wav_bytes(&samples, 16_000).unwrap();
        let clip = decode_engine_audio(&bytes).unwrap();
        assert_eq!(clip.sample_rate, 16_000);
        assert_eq!(clip.samples.len(), 1600);
    }

    #[test]
    fn raw_pcm_response_uses_engine_rate() {
        let mut bytes = Vec::new();
        for value in [0i16, 16384, -16384, 32767] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let clip = decode_engine_audio(&bytes).unwrap();
        assert_eq!(clip.sample_rate, ENGINE_OUTPUT_RATE);
        assert_eq!(clip.samples.len(), 4);
        assert!((clip.samples[1] - 0.5).abs() < 1e-3);
        assert!((clip.samples[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn empty_response_is_an_error() {
        assert!(decode_engine_audio(&[]).is_err());
    }
}
